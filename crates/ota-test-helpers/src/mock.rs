//! Mock host and storage for exercising the update handler.
//!
//! [`RecordingHost`] produces every callback the handler needs and records
//! each invocation into one shared timeline. [`MockStorage`] instances created
//! through [`RecordingHost::storage`] write into the same timeline, so tests
//! can assert the relative order of storage commits, status reports and
//! completion.

use std::ops::ControlFlow;
use std::sync::Arc;

use ota_firmware_update::{
    FirmwareState, HandlerCallbacks, ProgressUpdate, StorageError, StorageWriter,
};
use parking_lot::Mutex;

/// One observed interaction between the handler and its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The handler asked the transport for a chunk
    ChunkRequested(u32),
    /// A status report with its optional detail
    Status(FirmwareState, Option<String>),
    /// The session finished
    Finished,
    /// A progress report
    Progress {
        /// Chunks processed so far
        current_chunk: u32,
        /// Chunks in the image
        total_chunks: u32,
    },
    /// The completion callback ran
    Completed(bool),
    /// Storage was opened for an image of the given size
    StorageBegin(usize),
    /// Storage accepted the given number of bytes
    StorageWrite(usize),
    /// Storage was asked to commit the image
    StorageEnd,
    /// Storage discarded the partial image
    StorageReset,
}

#[derive(Debug, Default)]
struct HostState {
    events: Vec<HostEvent>,
    failing_requests: usize,
    cancel_at_chunk: Option<u32>,
}

impl HostState {
    fn push(&mut self, event: HostEvent) {
        self.events.push(event);
    }
}

/// Records every callback invocation of the update handler.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    state: Arc<Mutex<HostState>>,
}

impl RecordingHost {
    /// Host with an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler callbacks that record into this host.
    pub fn callbacks(&self) -> HandlerCallbacks {
        let requests = Arc::clone(&self.state);
        let statuses = Arc::clone(&self.state);
        let finish = Arc::clone(&self.state);
        HandlerCallbacks::builder()
            .request_chunk(move |chunk| {
                let mut state = requests.lock();
                state.push(HostEvent::ChunkRequested(chunk));
                if state.failing_requests > 0 {
                    state.failing_requests -= 1;
                    return false;
                }
                true
            })
            .report_status(move |status, detail| {
                statuses
                    .lock()
                    .push(HostEvent::Status(status, detail.map(str::to_owned)));
                true
            })
            .finish(move || {
                finish.lock().push(HostEvent::Finished);
                true
            })
            .build()
    }

    /// Progress callback, cancelling once the configured chunk count is reached.
    pub fn on_progress(&self) -> impl FnMut(ProgressUpdate) -> ControlFlow<()> + Send + 'static {
        let state = Arc::clone(&self.state);
        move |progress| {
            let mut state = state.lock();
            state.push(HostEvent::Progress {
                current_chunk: progress.current_chunk,
                total_chunks: progress.total_chunks,
            });
            if state.cancel_at_chunk == Some(progress.current_chunk) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }

    /// Completion callback.
    pub fn on_complete(&self) -> impl FnMut(bool) + Send + 'static {
        let state = Arc::clone(&self.state);
        move |success| state.lock().push(HostEvent::Completed(success))
    }

    /// Storage target recording into this host's timeline.
    pub fn storage(&self) -> MockStorage {
        MockStorage {
            inner: Arc::new(Mutex::new(StorageState::default())),
            host: Arc::clone(&self.state),
        }
    }

    /// Make the next `count` chunk requests report a publish failure.
    pub fn fail_requests(&self, count: usize) {
        self.state.lock().failing_requests = count;
    }

    /// Cancel from the progress callback once `chunk` chunks are processed.
    pub fn cancel_at_chunk(&self, chunk: u32) {
        self.state.lock().cancel_at_chunk = Some(chunk);
    }

    /// Every recorded event, oldest first.
    pub fn events(&self) -> Vec<HostEvent> {
        self.state.lock().events.clone()
    }

    /// Forget the recorded events.
    pub fn clear(&self) {
        self.state.lock().events.clear();
    }

    /// Indices of every requested chunk.
    pub fn requests(&self) -> Vec<u32> {
        self.filter(|e| match e {
            HostEvent::ChunkRequested(chunk) => Some(*chunk),
            _ => None,
        })
    }

    /// Every reported status.
    pub fn statuses(&self) -> Vec<FirmwareState> {
        self.filter(|e| match e {
            HostEvent::Status(status, _) => Some(*status),
            _ => None,
        })
    }

    /// Details attached to FAILED reports.
    pub fn failure_details(&self) -> Vec<String> {
        self.filter(|e| match e {
            HostEvent::Status(FirmwareState::Failed, detail) => detail.clone(),
            _ => None,
        })
    }

    /// Outcomes passed to the completion callback.
    pub fn completions(&self) -> Vec<bool> {
        self.filter(|e| match e {
            HostEvent::Completed(success) => Some(*success),
            _ => None,
        })
    }

    /// How often the session finished.
    pub fn finish_count(&self) -> usize {
        self.filter(|e| matches!(e, HostEvent::Finished).then_some(()))
            .len()
    }

    /// `(current_chunk, total_chunks)` of every progress report.
    pub fn progress(&self) -> Vec<(u32, u32)> {
        self.filter(|e| match e {
            HostEvent::Progress {
                current_chunk,
                total_chunks,
            } => Some((*current_chunk, *total_chunks)),
            _ => None,
        })
    }

    /// Index of the first occurrence of `event` in the timeline.
    pub fn position(&self, event: &HostEvent) -> Option<usize> {
        self.state.lock().events.iter().position(|e| e == event)
    }

    fn filter<T>(&self, f: impl FnMut(&HostEvent) -> Option<T>) -> Vec<T> {
        self.state.lock().events.iter().filter_map(f).collect()
    }
}

#[derive(Debug, Default)]
struct StorageState {
    image: Vec<u8>,
    committed: Option<Vec<u8>>,
    writing: bool,
    failing_begins: usize,
    failing_writes: usize,
    failing_ends: usize,
    begin_count: usize,
    write_count: usize,
    end_count: usize,
    reset_count: usize,
}

/// Storage target with failure injection.
///
/// Clones share state, so a test keeps one clone for inspection while the
/// handler owns another.
#[derive(Debug, Clone)]
pub struct MockStorage {
    inner: Arc<Mutex<StorageState>>,
    host: Arc<Mutex<HostState>>,
}

impl Default for MockStorage {
    fn default() -> Self {
        RecordingHost::new().storage()
    }
}

impl MockStorage {
    /// Storage recording into a private timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `begin` fail.
    pub fn fail_begins(&self, count: usize) {
        self.inner.lock().failing_begins = count;
    }

    /// Make the next `count` writes accept no bytes.
    pub fn fail_writes(&self, count: usize) {
        self.inner.lock().failing_writes = count;
    }

    /// Make the next `count` calls to `end` fail.
    pub fn fail_ends(&self, count: usize) {
        self.inner.lock().failing_ends = count;
    }

    /// Bytes written since the last `begin`.
    pub fn image(&self) -> Vec<u8> {
        self.inner.lock().image.clone()
    }

    /// Image committed by the last successful `end`.
    pub fn committed(&self) -> Option<Vec<u8>> {
        self.inner.lock().committed.clone()
    }

    /// Whether an image is open for writing.
    pub fn is_writing(&self) -> bool {
        self.inner.lock().writing
    }

    /// Calls to `begin`, failed ones included.
    pub fn begin_count(&self) -> usize {
        self.inner.lock().begin_count
    }

    /// Calls to `write`.
    pub fn write_count(&self) -> usize {
        self.inner.lock().write_count
    }

    /// Calls to `end`, failed ones included.
    pub fn end_count(&self) -> usize {
        self.inner.lock().end_count
    }

    /// Calls to `reset`.
    pub fn reset_count(&self) -> usize {
        self.inner.lock().reset_count
    }
}

impl StorageWriter for MockStorage {
    fn begin(&mut self, total_size: usize) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.begin_count += 1;
        self.host.lock().push(HostEvent::StorageBegin(total_size));
        if inner.failing_begins > 0 {
            inner.failing_begins -= 1;
            return Err(StorageError::rejected("mock begin failure"));
        }
        inner.image.clear();
        inner.writing = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock();
        inner.write_count += 1;
        let written = if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            0
        } else {
            inner.image.extend_from_slice(data);
            data.len()
        };
        self.host.lock().push(HostEvent::StorageWrite(written));
        Ok(written)
    }

    fn end(&mut self) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.end_count += 1;
        self.host.lock().push(HostEvent::StorageEnd);
        if inner.failing_ends > 0 {
            inner.failing_ends -= 1;
            return Err(StorageError::rejected("mock end failure"));
        }
        inner.committed = Some(inner.image.clone());
        inner.writing = false;
        Ok(())
    }

    fn reset(&mut self) {
        let mut inner = self.inner.lock();
        inner.reset_count += 1;
        inner.image.clear();
        inner.writing = false;
        self.host.lock().push(HostEvent::StorageReset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_shares_timeline_with_host() {
        let host = RecordingHost::new();
        let mut storage = host.storage();
        let inspect = storage.clone();

        storage.begin(4).unwrap();
        assert_eq!(storage.write(b"ab").unwrap(), 2);
        inspect.fail_writes(1);
        assert_eq!(storage.write(b"cd").unwrap(), 0);
        storage.end().unwrap();
        storage.reset();

        assert_eq!(inspect.committed(), Some(b"ab".to_vec()));
        assert_eq!(inspect.reset_count(), 1);
        assert_eq!(
            host.events(),
            vec![
                HostEvent::StorageBegin(4),
                HostEvent::StorageWrite(2),
                HostEvent::StorageWrite(0),
                HostEvent::StorageEnd,
                HostEvent::StorageReset,
            ]
        );
    }

    #[test]
    fn test_injected_begin_and_end_failures() {
        let mut storage = MockStorage::new();
        storage.fail_begins(1);
        storage.fail_ends(1);

        assert!(storage.begin(1).is_err());
        assert!(storage.begin(1).is_ok());
        assert!(storage.end().is_err());
        assert!(storage.end().is_ok());
        assert_eq!(storage.begin_count(), 2);
        assert_eq!(storage.end_count(), 2);
    }

    #[test]
    fn test_progress_cancels_at_configured_chunk() {
        let host = RecordingHost::new();
        host.cancel_at_chunk(2);
        let mut progress = host.on_progress();
        let update = |current_chunk| ProgressUpdate {
            current_chunk,
            total_chunks: 3,
            bytes_received: 0,
            total_bytes: 0,
        };

        assert_eq!(progress(update(1)), ControlFlow::Continue(()));
        assert_eq!(progress(update(2)), ControlFlow::Break(()));
        assert_eq!(host.progress(), vec![(1, 3), (2, 3)]);
    }
}
