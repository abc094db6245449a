//! Chunked firmware update handler.
//!
//! The handler requests the image one chunk at a time, streams every chunk
//! into storage and the running checksum, and verifies the checksum once the
//! last chunk arrived. Failures are recovered by re-requesting the awaited
//! chunk or by restarting the download, within a per-chunk retry budget.
//!
//! The handler is driven entirely from the outside: the transport delivers
//! chunks through [`OtaHandler::process_chunk`] and the host event loop polls
//! [`OtaHandler::poll_timeout`] (or waits until [`OtaHandler::next_deadline`]).
//! Callbacks run synchronously inside these calls.

use std::fmt;
use std::time::{Duration, Instant};

use ota_digest::{DigestAccumulator, DigestAlgorithm, digests_match};
use ota_watchdog::{Clock, MonotonicClock, TimeoutGuard};
use tracing::{debug, error, info, warn};

use crate::callbacks::HandlerCallbacks;
use crate::descriptor::{ProgressUpdate, UpdateDescriptor};
use crate::error::{OtaError, OtaResult};
use crate::session::{FailureDisposition, SessionPhase, SessionState};
use crate::status::FirmwareState;
use crate::storage::StorageWriter;

/// Event carried by the chunk timeout guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTimeout {
    /// Chunk whose response did not arrive
    pub chunk: u32,
    /// Timeout that elapsed
    pub timeout: Duration,
}

struct ActiveSession {
    descriptor: UpdateDescriptor,
    storage: Box<dyn StorageWriter>,
    algorithm: DigestAlgorithm,
    state: SessionState,
    phase: SessionPhase,
    bytes_received: u64,
}

/// Drives one firmware update at a time.
///
/// # Example
///
/// ```rust
/// use ota_firmware_update::prelude::*;
/// use std::sync::{Arc, Mutex};
///
/// let requested = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&requested);
/// let callbacks = HandlerCallbacks::builder()
///     .request_chunk(move |chunk| {
///         sink.lock().map(|mut r| r.push(chunk)).is_ok()
///     })
///     .report_status(|_, _| true)
///     .finish(|| true)
///     .build();
///
/// let image = b"firmware";
/// let digest = compute_digest(DigestAlgorithm::Sha256, DigestEncoding::Hex, image);
/// let descriptor = UpdateDescriptor::builder(image.len(), "SHA256", digest)
///     .storage(MemoryStorage::new())
///     .build();
///
/// let mut handler = OtaHandler::new(callbacks);
/// handler.start(descriptor);
/// handler.process_chunk(0, image);
/// assert!(!handler.is_active());
/// ```
pub struct OtaHandler<C: Clock = MonotonicClock> {
    callbacks: HandlerCallbacks,
    digest: DigestAccumulator,
    watchdog: TimeoutGuard<ChunkTimeout, C>,
    session: Option<ActiveSession>,
    last_error: Option<OtaError>,
}

impl OtaHandler<MonotonicClock> {
    /// Create an idle handler on the monotonic clock.
    #[must_use]
    pub fn new(callbacks: HandlerCallbacks) -> Self {
        Self::with_clock(callbacks, MonotonicClock)
    }
}

impl<C: Clock> OtaHandler<C> {
    /// Create an idle handler whose chunk timeouts are measured on `clock`.
    #[must_use]
    pub fn with_clock(callbacks: HandlerCallbacks, clock: C) -> Self {
        Self {
            callbacks,
            digest: DigestAccumulator::new(),
            watchdog: TimeoutGuard::with_clock(clock),
            session: None,
            last_error: None,
        }
    }

    /// Begin a new update.
    ///
    /// An update that is still running is stopped first. If the callbacks,
    /// the storage, the configuration or the checksum algorithm are unusable,
    /// FAILED is reported and the update completes unsuccessfully right away.
    pub fn start(&mut self, mut descriptor: UpdateDescriptor) {
        if self.session.is_some() {
            warn!("New firmware update started while another is running, stopping the old one");
            self.stop();
        }

        let (storage, algorithm, total_chunks) = match self.prepare(&mut descriptor) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.reject(descriptor, e);
                return;
            }
        };

        info!(
            "Starting firmware update {} {}: {} bytes in {} chunks of {} bytes",
            descriptor.title().unwrap_or("<untitled>"),
            descriptor.version().unwrap_or("<unversioned>"),
            descriptor.size(),
            total_chunks,
            descriptor.chunk_size()
        );

        let retries = descriptor.chunk_retries();
        self.last_error = None;
        self.session = Some(ActiveSession {
            descriptor,
            storage,
            algorithm,
            state: SessionState::new(total_chunks, retries),
            phase: SessionPhase::AwaitingFirstChunk,
            bytes_received: 0,
        });
        self.request_first_chunk();
    }

    /// Abort the running update. No-op when idle.
    ///
    /// FAILED is reported and the completion callback receives `false`.
    pub fn stop(&mut self) {
        let Some(session) = self.session.as_mut() else {
            debug!("No firmware update running, nothing to stop");
            return;
        };
        self.watchdog.disarm();
        session.storage.reset();
        info!("Firmware update aborted");
        self.fail(OtaError::Aborted);
    }

    /// Feed a received chunk into the update.
    ///
    /// Chunks arriving while idle or out of order are ignored.
    pub fn process_chunk(&mut self, index: u32, payload: &[u8]) {
        let Some(session) = self.session.as_ref() else {
            debug!("Received firmware chunk ({}) while no update is running", index);
            return;
        };
        let expected = session.state.next_chunk;

        self.report(FirmwareState::Downloading, None);

        if index != expected {
            warn!(
                "{}",
                OtaError::UnexpectedChunk {
                    received: index,
                    expected,
                }
            );
            return;
        }

        self.watchdog.disarm();
        debug!("Receive chunk ({}), with size ({}) bytes", index, payload.len());

        if let Err(e) = self.store_chunk(index, payload) {
            self.fail(e);
            return;
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let next = index.saturating_add(1);
        session.state.next_chunk = next;
        session.bytes_received = session
            .bytes_received
            .saturating_add(u64::try_from(payload.len()).unwrap_or(u64::MAX));

        let progress = ProgressUpdate {
            current_chunk: next,
            total_chunks: session.state.total_chunks,
            bytes_received: session.bytes_received,
            total_bytes: session.descriptor.size(),
        };
        if session.descriptor.notify_progress(progress).is_break() {
            info!("Firmware update cancelled from progress callback");
            self.stop();
            return;
        }

        session.state.retries_left = session.descriptor.chunk_retries();
        self.request_next_chunk();
    }

    /// Handle an elapsed chunk timeout if the deadline has passed.
    ///
    /// Returns whether a timeout was handled.
    pub fn poll_timeout(&mut self) -> bool {
        match self.watchdog.poll() {
            Some(timeout) => {
                self.on_timeout(timeout);
                true
            }
            None => false,
        }
    }

    /// Treat the awaited chunk as timed out right now. No-op when idle.
    pub fn handle_timeout(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let timeout = ChunkTimeout {
            chunk: session.state.next_chunk,
            timeout: session.descriptor.timeout(),
        };
        self.watchdog.disarm();
        self.on_timeout(timeout);
    }

    /// Check if an update is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.session
            .as_ref()
            .map_or(SessionPhase::Idle, |session| session.phase)
    }

    /// Index of the awaited chunk.
    #[must_use]
    pub fn next_chunk(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.state.next_chunk)
    }

    /// Chunks in the running update.
    #[must_use]
    pub fn total_chunks(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.state.total_chunks)
    }

    /// Failures still tolerated for the awaited chunk.
    #[must_use]
    pub fn retries_left(&self) -> Option<u8> {
        self.session.as_ref().map(|s| s.state.retries_left)
    }

    /// Whole-update restarts in the running update.
    #[must_use]
    pub fn restarts(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.state.restarts)
    }

    /// Bytes accepted since the download last started from chunk 0.
    #[must_use]
    pub fn bytes_received(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.bytes_received)
    }

    /// Check if a chunk timeout is pending.
    #[must_use]
    pub fn is_watchdog_armed(&self) -> bool {
        self.watchdog.is_armed()
    }

    /// When the pending chunk timeout elapses.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    /// Most recent failure, kept until the next update starts.
    #[must_use]
    pub fn last_error(&self) -> Option<&OtaError> {
        self.last_error.as_ref()
    }

    fn prepare(
        &self,
        descriptor: &mut UpdateDescriptor,
    ) -> OtaResult<(Box<dyn StorageWriter>, DigestAlgorithm, u32)> {
        if let Some(name) = self.callbacks.missing() {
            return Err(OtaError::MissingCallback(name));
        }
        if !descriptor.has_storage() {
            return Err(OtaError::MissingStorage);
        }
        descriptor.config().validate()?;
        let algorithm = descriptor
            .algorithm()
            .parse::<DigestAlgorithm>()
            .map_err(OtaError::Algorithm)?;
        let total_chunks = descriptor.total_chunks().ok_or_else(|| {
            OtaError::invalid_configuration(format!(
                "image of {} bytes needs too many chunks of {} bytes",
                descriptor.size(),
                descriptor.chunk_size()
            ))
        })?;
        let storage = descriptor.take_storage().ok_or(OtaError::MissingStorage)?;
        Ok((storage, algorithm, total_chunks))
    }

    fn reject(&mut self, mut descriptor: UpdateDescriptor, e: OtaError) {
        error!("Firmware update cannot start: {}", e);
        self.report(FirmwareState::Failed, Some(&e.to_string()));
        self.last_error = Some(e);
        descriptor.notify_complete(false);
        self.callbacks.finish();
    }

    fn request_first_chunk(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.state.next_chunk = 0;
        session.bytes_received = 0;
        session.phase = SessionPhase::AwaitingFirstChunk;
        session.storage.reset();
        self.digest.set_encoding(session.descriptor.encoding());
        self.digest.start(session.algorithm);
        self.watchdog.disarm();
        self.request_next_chunk();
    }

    fn request_next_chunk(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state.is_complete() {
            self.finish_update();
            return;
        }

        let chunk = session.state.next_chunk;
        let timeout = session.descriptor.timeout();
        session.phase = if chunk == 0 {
            SessionPhase::AwaitingFirstChunk
        } else {
            SessionPhase::AwaitingChunk(chunk)
        };
        debug!(
            "Requesting firmware chunk ({}) of ({})",
            chunk, session.state.total_chunks
        );

        if !self.callbacks.request_chunk(chunk) {
            let e = OtaError::RequestFailed { chunk };
            warn!("{}", e);
            self.report(FirmwareState::Failed, Some(&e.to_string()));
            self.last_error = Some(e);
        }
        // Armed even when the request failed, so the timeout retries it.
        self.watchdog.arm(timeout, ChunkTimeout { chunk, timeout });
    }

    fn store_chunk(&mut self, index: u32, payload: &[u8]) -> OtaResult<()> {
        let session = self.session.as_mut().ok_or(OtaError::Aborted)?;
        if index == 0 {
            session
                .storage
                .begin(session.descriptor.size())
                .map_err(OtaError::StorageBegin)?;
        }
        let written = match session.storage.write(payload) {
            Ok(written) => written,
            Err(e) => {
                warn!("Flash write rejected: {}", e);
                0
            }
        };
        if written != payload.len() {
            return Err(OtaError::StorageWrite {
                written,
                expected: payload.len(),
            });
        }
        self.digest.update(payload)?;
        Ok(())
    }

    fn finish_update(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.phase = SessionPhase::Verifying;
        }
        info!("Checksum verification of the downloaded firmware");
        self.report(FirmwareState::Downloaded, None);

        let actual = match self.digest.finalize() {
            Ok(actual) => actual,
            Err(e) => {
                self.fail(e.into());
                return;
            }
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let expected = session.descriptor.expected_digest();
        info!("Expected ({}) {} checksum", expected, session.algorithm);
        info!("Actual ({}) {} checksum", actual, session.algorithm);
        if !digests_match(expected, &actual) {
            let e = OtaError::ChecksumMismatch {
                expected: expected.to_owned(),
                actual,
            };
            self.fail(e);
            return;
        }
        info!("Checksum is the same as expected");

        session.phase = SessionPhase::Finalizing;
        if let Err(e) = session.storage.end() {
            self.fail(OtaError::StorageEnd(e));
            return;
        }
        info!("Update success");
        self.report(FirmwareState::Updating, None);
        self.complete(true);
    }

    fn on_timeout(&mut self, timeout: ChunkTimeout) {
        if self.session.is_none() {
            return;
        }
        let e = OtaError::ChunkTimeout {
            chunk: timeout.chunk,
            timeout: timeout.timeout,
        };
        warn!("{}", e);
        self.last_error = Some(e);
        self.handle_failure(FailureDisposition::RetryChunk);
    }

    fn fail(&mut self, e: OtaError) {
        error!("{}", e);
        self.report(FirmwareState::Failed, Some(&e.to_string()));
        let disposition = e.disposition();
        self.last_error = Some(e);
        if let Some(disposition) = disposition {
            self.handle_failure(disposition);
        }
    }

    fn handle_failure(&mut self, disposition: FailureDisposition) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if disposition == FailureDisposition::Abort {
            self.complete(false);
            return;
        }
        if !session.state.consume_retry() {
            warn!("Retries exhausted, giving up firmware update ({})", disposition);
            self.complete(false);
            return;
        }
        if disposition == FailureDisposition::RetryWholeUpdate && !session.state.consume_restart() {
            warn!(
                "Firmware download restarted {} times, giving up",
                session.state.restarts
            );
            self.complete(false);
            return;
        }

        let retries_left = session.state.retries_left;
        match disposition {
            FailureDisposition::RetryChunk => {
                info!(
                    "Retrying firmware chunk ({}), {} retries left",
                    session.state.next_chunk, retries_left
                );
                self.request_next_chunk();
            }
            FailureDisposition::RetryWholeUpdate => {
                info!(
                    "Restarting firmware download from the first chunk, {} retries left",
                    retries_left
                );
                self.request_first_chunk();
            }
            FailureDisposition::Abort => self.complete(false),
        }
    }

    fn complete(&mut self, success: bool) {
        self.watchdog.disarm();
        let Some(mut session) = self.session.take() else {
            return;
        };
        if !success {
            session.storage.reset();
            warn!("Firmware update failed");
        }
        session.descriptor.notify_complete(success);
        self.callbacks.finish();
    }

    fn report(&mut self, state: FirmwareState, detail: Option<&str>) {
        if !self.callbacks.report_status(state, detail) {
            debug!("Firmware state {} was not delivered", state);
        }
    }
}

impl<C: Clock + fmt::Debug> fmt::Debug for OtaHandler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtaHandler")
            .field("callbacks", &self.callbacks)
            .field("watchdog", &self.watchdog)
            .field("phase", &self.phase())
            .field("next_chunk", &self.next_chunk())
            .field("total_chunks", &self.total_chunks())
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}
