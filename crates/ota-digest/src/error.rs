//! Error types for digest computation.

use thiserror::Error;

/// Errors raised while parsing an algorithm identifier or hashing firmware data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// The identifier names an algorithm this crate knows about but cannot compute.
    #[error("Unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The identifier does not name any known checksum algorithm.
    #[error("Unknown checksum algorithm: {0}")]
    UnknownAlgorithm(String),

    /// `update` or `finalize` was called before `start`.
    #[error("Digest computation has not been started")]
    NotStarted,

    /// The processed byte counter would overflow.
    #[error("Digest input length overflow after {processed} bytes")]
    LengthOverflow {
        /// Bytes hashed before the failing update
        processed: u64,
    },
}

impl DigestError {
    /// Create an unsupported algorithm error.
    #[must_use]
    pub fn unsupported(identifier: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm(identifier.into())
    }

    /// Create an unknown algorithm error.
    #[must_use]
    pub fn unknown(identifier: impl Into<String>) -> Self {
        Self::UnknownAlgorithm(identifier.into())
    }
}

/// Result type for digest operations
pub type DigestResult<T> = std::result::Result<T, DigestError>;
