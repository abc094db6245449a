//! Flash target abstraction
//!
//! The update handler never looks inside the storage target. It announces the
//! image size with `begin`, streams chunks through `write`, commits with `end`
//! and discards partial data with `reset`, checking only the results.

use tracing::debug;

use crate::error::StorageError;

/// Destination of the downloaded firmware image.
pub trait StorageWriter: Send {
    /// Prepare the target for an image of `total_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot hold or accept the image.
    fn begin(&mut self, total_size: usize) -> Result<(), StorageError>;

    /// Append `data`, returning how many bytes were actually written.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing could be written; the handler treats it
    /// like a write of zero bytes.
    fn write(&mut self, data: &[u8]) -> Result<usize, StorageError>;

    /// Commit the written image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is incomplete or cannot be activated.
    fn end(&mut self) -> Result<(), StorageError>;

    /// Discard any partially written image. Must be idempotent.
    fn reset(&mut self);
}

impl<S: StorageWriter + ?Sized> StorageWriter for Box<S> {
    fn begin(&mut self, total_size: usize) -> Result<(), StorageError> {
        (**self).begin(total_size)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        (**self).write(data)
    }

    fn end(&mut self) -> Result<(), StorageError> {
        (**self).end()
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// RAM-backed storage target for hosts without flash.
///
/// Writes beyond the capacity are truncated (a short write), and `end`
/// fails unless exactly the announced number of bytes was written.
///
/// # Example
///
/// ```rust
/// use ota_firmware_update::storage::{MemoryStorage, StorageWriter};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut storage = MemoryStorage::with_capacity(8);
/// storage.begin(6)?;
/// assert_eq!(storage.write(b"abc")?, 3);
/// assert_eq!(storage.write(b"def")?, 3);
/// storage.end()?;
/// assert_eq!(storage.image(), Some(&b"abcdef"[..]));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    capacity: Option<usize>,
    expected: Option<usize>,
    buffer: Vec<u8>,
    committed: Option<Vec<u8>>,
}

impl MemoryStorage {
    /// Create an unbounded storage target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage target that holds at most `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Bytes written since the last `begin`.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.buffer
    }

    /// The last committed image.
    #[must_use]
    pub fn image(&self) -> Option<&[u8]> {
        self.committed.as_deref()
    }

    /// Whether a write session is open.
    #[must_use]
    pub fn is_writing(&self) -> bool {
        self.expected.is_some()
    }
}

impl StorageWriter for MemoryStorage {
    fn begin(&mut self, total_size: usize) -> Result<(), StorageError> {
        if let Some(capacity) = self.capacity
            && total_size > capacity
        {
            return Err(StorageError::CapacityExceeded {
                capacity,
                requested: total_size,
            });
        }
        self.buffer.clear();
        self.buffer.reserve(total_size);
        self.expected = Some(total_size);
        debug!(total_size, "Memory storage opened");
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        if self.expected.is_none() {
            return Err(StorageError::NotStarted);
        }
        let room = self
            .capacity
            .map_or(data.len(), |c| c.saturating_sub(self.buffer.len()));
        let accepted = data.get(..room.min(data.len())).unwrap_or_default();
        self.buffer.extend_from_slice(accepted);
        Ok(accepted.len())
    }

    fn end(&mut self) -> Result<(), StorageError> {
        let expected = self.expected.ok_or(StorageError::NotStarted)?;
        if self.buffer.len() != expected {
            return Err(StorageError::Incomplete {
                written: self.buffer.len(),
                expected,
            });
        }
        self.expected = None;
        self.committed = Some(std::mem::take(&mut self.buffer));
        debug!(size = expected, "Memory storage committed");
        Ok(())
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.expected = None;
    }
}
