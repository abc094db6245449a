//! Session bookkeeping for a single update attempt.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Recovery action chosen after a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureDisposition {
    /// Request the awaited chunk again
    RetryChunk,
    /// Restart the download from chunk 0
    RetryWholeUpdate,
    /// Give up immediately, ignoring the remaining retries
    Abort,
}

impl fmt::Display for FailureDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RetryChunk => "retry chunk",
            Self::RetryWholeUpdate => "retry whole update",
            Self::Abort => "abort",
        })
    }
}

/// Where the handler is in the update lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No update running
    #[default]
    Idle,
    /// Waiting for the response to chunk 0
    AwaitingFirstChunk,
    /// Waiting for the response to the given chunk
    AwaitingChunk(u32),
    /// All chunks received, comparing checksums
    Verifying,
    /// Checksum matched, committing the image
    Finalizing,
}

impl SessionPhase {
    /// Check if an update is running.
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Number of chunks requested for an image.
///
/// This is `size / chunk_size + 1`, which requests one extra, empty chunk
/// when `size` is an exact multiple of `chunk_size`. Update servers answer
/// that request with an empty payload, so the count is kept as is.
/// Returns `None` for a zero chunk size or a count beyond `u32`.
#[must_use]
pub fn total_chunks(size: usize, chunk_size: usize) -> Option<u32> {
    let chunks = size.checked_div(chunk_size)?.checked_add(1)?;
    u32::try_from(chunks).ok()
}

/// Mutable counters of an active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Chunks the image is split into
    pub total_chunks: u32,
    /// Index of the chunk being waited for
    pub next_chunk: u32,
    /// Failures still tolerated for the current chunk
    pub retries_left: u8,
    /// Whole-update restarts performed so far
    pub restarts: u32,
    /// Whole-update restarts allowed per session
    pub max_restarts: u32,
}

impl SessionState {
    /// Fresh state for a session of `total_chunks` chunks.
    #[must_use]
    pub fn new(total_chunks: u32, retries: u8) -> Self {
        Self {
            total_chunks,
            next_chunk: 0,
            retries_left: retries,
            restarts: 0,
            max_restarts: u32::from(retries),
        }
    }

    /// Whether every chunk has been processed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.next_chunk >= self.total_chunks
    }

    /// Count a restart from chunk 0. Returns `false` once the session ran out of restarts.
    ///
    /// Unlike the per-chunk budget this one is never refilled, so a failure
    /// that only shows after the last chunk cannot restart the download forever.
    pub fn consume_restart(&mut self) -> bool {
        if self.restarts >= self.max_restarts {
            return false;
        }
        self.restarts = self.restarts.saturating_add(1);
        true
    }

    /// Spend one retry. Returns `false` when the budget was already empty.
    pub fn consume_retry(&mut self) -> bool {
        match self.retries_left.checked_sub(1) {
            Some(left) => {
                self.retries_left = left;
                true
            }
            None => false,
        }
    }
}
