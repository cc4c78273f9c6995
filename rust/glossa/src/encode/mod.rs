//! Encoding SDX dictionaries.
pub mod sdx;

// Re-exports
pub use sdx::Encoder as SdxEncoder;
