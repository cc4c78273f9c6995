//! Types for errors that can occur while reading and writing dictionaries.

use std::io;

/// An error that can occur while reading or writing a dictionary file.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error while reading or writing a file or stream.
    #[error("I/O error: {source:?} while {context}")]
    Io {
        /// The original error.
        #[source]
        source: io::Error,
        /// The context in which the error occurred.
        context: String,
    },
    /// An error while decoding a dictionary container.
    #[error("decoding error: {0}")]
    Decode(String),
    /// An error while encoding SDX output.
    #[error("encoding error: {0}")]
    Encode(String),
    /// An error while converting text between charsets.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// An alias for a `Result` with [`enum@Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new I/O [`enum@Error`] with the given `context`.
    pub fn io(error: io::Error, context: impl ToString) -> Self {
        Self::Io {
            source: error,
            context: context.to_string(),
        }
    }

    /// Creates a new decoding [`enum@Error`].
    pub fn decode(msg: impl ToString) -> Self {
        Self::Decode(msg.to_string())
    }

    /// Creates a new encoding [`enum@Error`].
    pub fn encode(msg: impl ToString) -> Self {
        Self::Encode(msg.to_string())
    }

    /// Creates a new conversion [`enum@Error`].
    pub fn conversion(msg: impl ToString) -> Self {
        Self::Conversion(msg.to_string())
    }
}

/// Maps an end-of-file error to `Ok(None)`, passing all other errors
/// through. Used where a short read means "no more entries" rather than
/// failure.
pub(crate) fn silence_eof_error<T>(error: Error) -> Result<Option<T>> {
    match &error {
        Error::Io { source, .. } if source.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        _ => Err(error),
    }
}
