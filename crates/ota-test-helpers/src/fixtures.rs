//! Firmware images and update descriptors for common test scenarios.

use std::time::Duration;

use ota_digest::{DigestAlgorithm, DigestEncoding, compute_digest};
use ota_firmware_update::{UpdateConfig, UpdateDescriptor, total_chunks};

#[cfg(feature = "mock")]
use crate::mock::{MockStorage, RecordingHost};

/// Deterministic, non-repeating-looking image of `len` bytes.
pub fn firmware_image(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| u8::try_from((i.wrapping_mul(31).wrapping_add(7)) % 251).unwrap())
        .collect()
}

/// Hex SHA-256 of `image`.
pub fn sha256_hex(image: &[u8]) -> String {
    compute_digest(DigestAlgorithm::Sha256, DigestEncoding::Hex, image)
}

/// An image plus the transfer parameters used to deliver it.
#[derive(Debug, Clone)]
pub struct UpdateFixture {
    /// Complete firmware image
    pub image: Vec<u8>,
    /// Bytes per requested chunk
    pub chunk_size: usize,
    /// Per-chunk retry budget
    pub chunk_retries: u8,
    /// Per-chunk response timeout
    pub timeout: Duration,
    /// Checksum algorithm announced with the image
    pub algorithm: DigestAlgorithm,
    /// Text encoding of the announced checksum
    pub encoding: DigestEncoding,
}

impl UpdateFixture {
    /// Image of `len` bytes delivered in chunks of `chunk_size` bytes.
    pub fn new(len: usize, chunk_size: usize) -> Self {
        Self {
            image: firmware_image(len),
            chunk_size,
            chunk_retries: 3,
            timeout: Duration::from_secs(5),
            algorithm: DigestAlgorithm::Sha256,
            encoding: DigestEncoding::Hex,
        }
    }

    /// Set the per-chunk retry budget.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.chunk_retries = retries;
        self
    }

    /// Set the per-chunk response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Announce the checksum with `algorithm` instead of SHA-256.
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Announce the checksum in `encoding` instead of hex.
    pub fn with_encoding(mut self, encoding: DigestEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Checksum the update server would announce.
    pub fn digest(&self) -> String {
        compute_digest(self.algorithm, self.encoding, &self.image)
    }

    /// Transfer settings for the descriptor.
    ///
    /// # Panics
    ///
    /// Panics if the chunk size or timeout is zero.
    pub fn config(&self) -> UpdateConfig {
        UpdateConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_retries(self.chunk_retries)
            .timeout(self.timeout)
            .build()
            .unwrap()
    }

    /// Number of chunks the handler will request.
    pub fn total_chunks(&self) -> u32 {
        total_chunks(self.image.len(), self.chunk_size).unwrap()
    }

    /// Payload of chunk `index`; empty past the end of the image.
    pub fn chunk(&self, index: u32) -> &[u8] {
        let start = (index as usize)
            .saturating_mul(self.chunk_size)
            .min(self.image.len());
        let end = start.saturating_add(self.chunk_size).min(self.image.len());
        &self.image[start..end]
    }

    /// Descriptor with the announced checksum but without storage or callbacks.
    pub fn descriptor_builder(&self) -> ota_firmware_update::UpdateDescriptorBuilder {
        UpdateDescriptor::builder(self.image.len(), self.algorithm.as_str(), self.digest())
            .title("test-firmware")
            .version("1.0.0")
            .encoding(self.encoding)
            .config(self.config())
    }

    /// Descriptor wired to `host` and writing into `storage`.
    #[cfg(feature = "mock")]
    pub fn descriptor(&self, host: &RecordingHost, storage: &MockStorage) -> UpdateDescriptor {
        self.descriptor_builder()
            .storage(storage.clone())
            .on_progress(host.on_progress())
            .on_complete(host.on_complete())
            .build()
    }
}
