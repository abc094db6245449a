//! Error types for chunked firmware updates
//!
//! Every failure the update handler can hit is an [`OtaError`]. Its
//! [`category`](OtaError::category) follows the recovery taxonomy of the
//! handler and its [`disposition`](OtaError::disposition) tells the handler
//! how to recover. The `Display` text is what gets reported upstream
//! together with the `FAILED` status.

use std::time::Duration;
use thiserror::Error;

use ota_digest::DigestError;

use crate::session::FailureDisposition;

/// Errors reported by a [`StorageWriter`](crate::storage::StorageWriter).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend refused the operation
    #[error("Storage rejected operation: {0}")]
    Rejected(String),

    /// The image does not fit into the target
    #[error("Image of {requested} bytes exceeds storage capacity of {capacity} bytes")]
    CapacityExceeded {
        /// Capacity of the target in bytes
        capacity: usize,
        /// Requested size in bytes
        requested: usize,
    },

    /// Fewer bytes were written than announced in `begin`
    #[error("Only {written} of {expected} announced bytes were written")]
    Incomplete {
        /// Bytes written
        written: usize,
        /// Bytes announced
        expected: usize,
    },

    /// `write` or `end` was called without `begin`
    #[error("Storage write session has not been started")]
    NotStarted,
}

impl StorageError {
    /// Create a rejected operation error.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

/// Recovery class of an [`OtaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing callbacks, storage or configuration; aborts without retry
    Setup,
    /// Chunk request could not be sent or was not answered in time
    Transport,
    /// Flash target failed to begin, write or finalize
    Storage,
    /// The downloaded image cannot be trusted
    Integrity,
    /// Chunk index did not match the requested one; ignored
    Protocol,
    /// The update was cancelled
    Cancelled,
}

/// Errors that can occur during a chunked firmware update
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtaError {
    /// A construction-time callback is not set
    #[error("Required OTA callback is not set: {0}")]
    MissingCallback(&'static str),

    /// The descriptor carries no storage writer
    #[error("No storage writer bound to the firmware update")]
    MissingStorage,

    /// Configuration or descriptor values are invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The checksum algorithm is not usable
    #[error("Checksum algorithm not usable: {0}")]
    Algorithm(DigestError),

    /// Feeding or finishing the digest failed
    #[error("Updating hash failed: {0}")]
    Digest(#[from] DigestError),

    /// The chunk request could not be published
    #[error("Unable to request firmware chunk ({chunk})")]
    RequestFailed {
        /// Requested chunk index
        chunk: u32,
    },

    /// No response arrived for a chunk request
    #[error("No response for firmware chunk ({chunk}) within {timeout:?}")]
    ChunkTimeout {
        /// Requested chunk index
        chunk: u32,
        /// Configured timeout
        timeout: Duration,
    },

    /// The storage writer could not be initialized
    #[error("Failed to initialize flash updater: {0}")]
    StorageBegin(StorageError),

    /// The storage writer accepted fewer bytes than delivered
    #[error(
        "Only wrote ({written}) bytes of binary data to flash memory instead of expected ({expected})"
    )]
    StorageWrite {
        /// Bytes written
        written: usize,
        /// Bytes in the chunk
        expected: usize,
    },

    /// The storage writer could not be finalized
    #[error("Error during flash updater not all bytes written: {0}")]
    StorageEnd(StorageError),

    /// The computed checksum differs from the announced one
    #[error("Checksum verification failed: expected ({expected}), actual ({actual})")]
    ChecksumMismatch {
        /// Announced checksum
        expected: String,
        /// Checksum of the received image
        actual: String,
    },

    /// A chunk other than the requested one arrived
    #[error("Received chunk ({received}), not the same as requested chunk ({expected})")]
    UnexpectedChunk {
        /// Index carried by the response
        received: u32,
        /// Index the handler is waiting for
        expected: u32,
    },

    /// The update was stopped
    #[error("Firmware update aborted")]
    Aborted,

    /// The event loop driving the handler has shut down
    #[error("Update driver is no longer running")]
    DriverClosed,
}

impl OtaError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Recovery class of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingCallback(_)
            | Self::MissingStorage
            | Self::InvalidConfiguration(_)
            | Self::Algorithm(_) => ErrorCategory::Setup,
            Self::RequestFailed { .. } | Self::ChunkTimeout { .. } => ErrorCategory::Transport,
            Self::StorageBegin(_) | Self::StorageWrite { .. } | Self::StorageEnd(_) => {
                ErrorCategory::Storage
            }
            Self::Digest(_) | Self::ChecksumMismatch { .. } => ErrorCategory::Integrity,
            Self::UnexpectedChunk { .. } => ErrorCategory::Protocol,
            Self::Aborted | Self::DriverClosed => ErrorCategory::Cancelled,
        }
    }

    /// How the handler recovers from this error, `None` when it is ignored.
    #[must_use]
    pub fn disposition(&self) -> Option<FailureDisposition> {
        match self.category() {
            ErrorCategory::Setup | ErrorCategory::Cancelled => Some(FailureDisposition::Abort),
            ErrorCategory::Transport => Some(FailureDisposition::RetryChunk),
            ErrorCategory::Storage | ErrorCategory::Integrity => {
                Some(FailureDisposition::RetryWholeUpdate)
            }
            ErrorCategory::Protocol => None,
        }
    }
}

/// Result type for firmware update operations
pub type OtaResult<T> = std::result::Result<T, OtaError>;
