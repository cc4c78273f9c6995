//! A crate for reading BGL and reading and writing SDX offline bilingual
//! dictionary files.
//!
//! Both containers are exposed as a stream of [`Entry`] values plus a
//! [`Metadata`] record describing the dictionary. BGL is a proprietary
//! compressed block-stream format and is read-only; SDX is an open indexed
//! format (an `.ifo` info file, a sorted `.idx` index, and a `.dict`
//! definition blob, either of the latter optionally gzip/dictzip-compressed)
//! and is supported for both [reading](decode::sdx) and
//! [writing](encode::sdx).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::missing_errors_doc)]

pub mod charset;
pub mod decode;
pub mod encode;
pub mod entry;
pub mod error;
pub mod metadata;

pub use crate::{
    entry::Entry,
    error::{Error, Result},
    metadata::{Metadata, MetadataBuilder},
};
