//! Error types for the blob store.

use std::io;
use std::path::PathBuf;

/// The result type used throughout the blob store.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A header or index line is malformed. The store must be treated as unusable.
    #[error("Format error: {0}")]
    Format(String),

    /// An entry name contains a byte outside 0x20..=0x7E, contains `=`, or is empty.
    #[error("Invalid entry name: {0}")]
    InvalidName(String),

    /// The target file exists and overwriting is disabled.
    #[error("Already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// An encoding other than `identity` or `gzip` was requested.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store is in an invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates a new format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// Creates a new invalid name error.
    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Error::InvalidName(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::Format(_) => io::Error::new(io::ErrorKind::InvalidData, err),
            Error::AlreadyExists(_) => io::Error::new(io::ErrorKind::AlreadyExists, err),
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::format("bad header");
        assert_eq!(err.to_string(), "Format error: bad header");

        let err = Error::AlreadyExists(PathBuf::from("/tmp/blob.bin"));
        assert!(err.to_string().contains("/tmp/blob.bin"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_into_io_keeps_kind() {
        let io_err: io::Error = Error::format("broken line").into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        let original = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let io_err: io::Error = Error::Io(original).into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
