//! Metadata of one firmware update.

use std::fmt;
use std::ops::ControlFlow;
use std::time::Duration;

use ota_digest::DigestEncoding;
use serde::{Deserialize, Serialize};

use crate::config::UpdateConfig;
use crate::session::total_chunks;
use crate::storage::StorageWriter;

/// Progress after a chunk has been written and hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Chunks processed so far
    pub current_chunk: u32,
    /// Chunks in the image
    pub total_chunks: u32,
    /// Bytes processed so far
    pub bytes_received: u64,
    /// Size of the image in bytes
    pub total_bytes: usize,
}

impl ProgressUpdate {
    /// Progress as percentage (0-100).
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total_chunks == 0 {
            return 100;
        }
        let percent = u64::from(self.current_chunk)
            .saturating_mul(100)
            .checked_div(u64::from(self.total_chunks))
            .unwrap_or(100)
            .min(100);
        u8::try_from(percent).unwrap_or(100)
    }
}

/// Progress callback. Returning `ControlFlow::Break(())` cancels the update.
pub type ProgressCallback = Box<dyn FnMut(ProgressUpdate) -> ControlFlow<()> + Send>;

/// Completion callback, called once per update with the outcome.
pub type CompletionCallback = Box<dyn FnMut(bool) + Send>;

/// Everything the handler needs to run one update.
///
/// The handler takes the descriptor by value when the update starts and
/// drops it when the update ends, together with the storage writer it carries.
pub struct UpdateDescriptor {
    title: Option<String>,
    version: Option<String>,
    size: usize,
    algorithm: String,
    expected_digest: String,
    encoding: DigestEncoding,
    config: UpdateConfig,
    storage: Option<Box<dyn StorageWriter>>,
    on_progress: Option<ProgressCallback>,
    on_complete: Option<CompletionCallback>,
}

impl UpdateDescriptor {
    /// Start describing an image of `size` bytes whose `algorithm` checksum is `expected_digest`.
    #[must_use]
    pub fn builder(
        size: usize,
        algorithm: impl Into<String>,
        expected_digest: impl Into<String>,
    ) -> UpdateDescriptorBuilder {
        UpdateDescriptorBuilder {
            descriptor: Self {
                title: None,
                version: None,
                size,
                algorithm: algorithm.into(),
                expected_digest: expected_digest.into(),
                encoding: DigestEncoding::default(),
                config: UpdateConfig::default(),
                storage: None,
                on_progress: None,
                on_complete: None,
            },
        }
    }

    /// Firmware title, if known.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Firmware version, if known.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Size of the image in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Checksum algorithm identifier as announced by the server.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Announced checksum of the complete image.
    #[must_use]
    pub fn expected_digest(&self) -> &str {
        &self.expected_digest
    }

    /// Text encoding of the announced checksum.
    #[must_use]
    pub fn encoding(&self) -> DigestEncoding {
        self.encoding
    }

    /// Transfer configuration.
    #[must_use]
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Size of each requested chunk in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    /// Retry budget per chunk.
    #[must_use]
    pub fn chunk_retries(&self) -> u8 {
        self.config.chunk_retries
    }

    /// Chunk response timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Number of chunks that will be requested, `None` for an unusable chunk size.
    #[must_use]
    pub fn total_chunks(&self) -> Option<u32> {
        total_chunks(self.size, self.config.chunk_size)
    }

    /// Whether a storage writer is bound.
    #[must_use]
    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    pub(crate) fn take_storage(&mut self) -> Option<Box<dyn StorageWriter>> {
        self.storage.take()
    }

    pub(crate) fn notify_progress(&mut self, progress: ProgressUpdate) -> ControlFlow<()> {
        match self.on_progress.as_mut() {
            Some(callback) => callback(progress),
            None => ControlFlow::Continue(()),
        }
    }

    pub(crate) fn notify_complete(&mut self, success: bool) {
        if let Some(callback) = self.on_complete.as_mut() {
            callback(success);
        }
    }
}

impl fmt::Debug for UpdateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateDescriptor")
            .field("title", &self.title)
            .field("version", &self.version)
            .field("size", &self.size)
            .field("algorithm", &self.algorithm)
            .field("expected_digest", &self.expected_digest)
            .field("encoding", &self.encoding)
            .field("config", &self.config)
            .field("has_storage", &self.storage.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for `UpdateDescriptor`.
///
/// Nothing is validated here; an unusable descriptor makes the update fail
/// at start so the failure is reported like any other.
pub struct UpdateDescriptorBuilder {
    descriptor: UpdateDescriptor,
}

impl UpdateDescriptorBuilder {
    /// Set the firmware title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.descriptor.title = Some(title.into());
        self
    }

    /// Set the firmware version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.descriptor.version = Some(version.into());
        self
    }

    /// Set the text encoding of the expected checksum.
    #[must_use]
    pub fn encoding(mut self, encoding: DigestEncoding) -> Self {
        self.descriptor.encoding = encoding;
        self
    }

    /// Set the transfer configuration.
    #[must_use]
    pub fn config(mut self, config: UpdateConfig) -> Self {
        self.descriptor.config = config;
        self
    }

    /// Bind the storage target the image is written to.
    #[must_use]
    pub fn storage(mut self, storage: impl StorageWriter + 'static) -> Self {
        self.descriptor.storage = Some(Box::new(storage));
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn on_progress(
        mut self,
        callback: impl FnMut(ProgressUpdate) -> ControlFlow<()> + Send + 'static,
    ) -> Self {
        self.descriptor.on_progress = Some(Box::new(callback));
        self
    }

    /// Set the completion callback.
    #[must_use]
    pub fn on_complete(mut self, callback: impl FnMut(bool) + Send + 'static) -> Self {
        self.descriptor.on_complete = Some(Box::new(callback));
        self
    }

    /// Finish the descriptor.
    #[must_use]
    pub fn build(self) -> UpdateDescriptor {
        self.descriptor
    }
}

impl fmt::Debug for UpdateDescriptorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateDescriptorBuilder")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
