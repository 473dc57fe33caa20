//! Error types for the bdatrs crate.
//!
//! All fallible operations return [`Result`]. The [`Error`] enum mirrors the
//! status codes of the file-format layer: I/O failures, malformed bytes,
//! unsupported dialects, value-domain violations, and user-initiated aborts.
//! Display strings are the human-readable messages the conversion driver
//! prints to stderr.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for parsing, writing, and conversion.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Underlying I/O error from the byte source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed bytes encountered while parsing.
    #[error("invalid file, or file has unsupported features: {message}")]
    Parse {
        /// Description of what was malformed.
        message: String,
    },

    /// The file extension or dialect is not handled by this crate.
    #[error("file format not supported: {}", path.display())]
    UnsupportedFormat {
        /// Path whose format could not be handled.
        path: PathBuf,
    },

    /// The dialect is known but the declared file version is not handled.
    #[error("file format version {version} not supported")]
    UnsupportedFormatVersion {
        /// The offending version number.
        version: i64,
    },

    /// Text could not be decoded with the file's declared encoding.
    #[error("unable to convert string to the requested encoding")]
    Encoding,

    /// A value is outside the domain the format can represent,
    /// e.g. a missing-value tag outside `a`..`z`.
    #[error("a provided value was outside the range of representable values: {message}")]
    ValueOutOfRange {
        /// Description of the offending value.
        message: String,
    },

    /// The number of rows written does not match the declared row count.
    #[error("wrote {actual} rows but {expected} were declared")]
    RowCountMismatch {
        /// Rows promised up front.
        expected: u64,
        /// Rows actually supplied.
        actual: u64,
    },

    /// A handler or progress callback requested termination.
    #[error("processing was cancelled")]
    UserAbort,
}

impl Error {
    /// Create a parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an unsupported-format error for a path.
    #[must_use]
    pub fn unsupported_format(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedFormat { path: path.into() }
    }

    /// Create a value-out-of-range error.
    #[must_use]
    pub fn value_out_of_range(message: impl Into<String>) -> Self {
        Self::ValueOutOfRange {
            message: message.into(),
        }
    }

    /// `true` if this error was caused by a handler or progress abort.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::UserAbort)
    }
}

/// Result type for bdatrs operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = Error::parse("bad page header");
        assert_eq!(
            e.to_string(),
            "invalid file, or file has unsupported features: bad page header"
        );

        let e = Error::UnsupportedFormatVersion { version: 3 };
        assert_eq!(e.to_string(), "file format version 3 not supported");

        let e = Error::RowCountMismatch {
            expected: 10,
            actual: 7,
        };
        assert_eq!(e.to_string(), "wrote 7 rows but 10 were declared");
    }

    #[test]
    fn test_is_abort() {
        assert!(Error::UserAbort.is_abort());
        assert!(!Error::Encoding.is_abort());
    }
}
