//! Chunked, resumable firmware updates for constrained devices
//!
//! This crate downloads a firmware image piecewise and installs it with:
//! - Chunk-by-chunk requests with a per-chunk response timeout
//! - Streaming writes into a pluggable storage target
//! - Incremental checksum verification before the image is committed
//! - Bounded retries of single chunks or of the whole download
//! - Status reporting to the update server
//!
//! # Architecture
//!
//! - [`handler`]: the update state machine
//! - [`driver`]: tokio event loop that owns a handler
//! - [`descriptor`]: metadata, storage and callbacks of one update
//! - [`callbacks`]: transport and status reporting callbacks
//! - [`storage`]: storage target abstraction
//! - [`session`]: retry and chunk bookkeeping
//! - [`config`]: transfer configuration
//! - [`status`]: reported firmware states
//! - [`error`]: error types
//!
//! # Example
//!
//! ```
//! use ota_firmware_update::prelude::*;
//!
//! # fn main() -> OtaResult<()> {
//! let callbacks = HandlerCallbacks::builder()
//!     .request_chunk(|_chunk| true)
//!     .report_status(|state, _detail| state != FirmwareState::Failed)
//!     .finish(|| true)
//!     .build();
//! let mut handler = OtaHandler::new(callbacks);
//!
//! let image = vec![0xA5; 10];
//! let digest = compute_digest(DigestAlgorithm::Sha256, DigestEncoding::Hex, &image);
//! let config = UpdateConfig::builder().chunk_size(4).build()?;
//! let descriptor = UpdateDescriptor::builder(image.len(), "SHA256", digest)
//!     .config(config)
//!     .storage(MemoryStorage::new())
//!     .on_complete(|success| assert!(success))
//!     .build();
//!
//! handler.start(descriptor);
//! for (index, chunk) in (0u32..).zip(image.chunks(4)) {
//!     handler.process_chunk(index, chunk);
//! }
//! assert!(!handler.is_active());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod callbacks;
pub mod config;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod handler;
pub mod prelude;
pub mod session;
pub mod status;
pub mod storage;

pub use callbacks::{HandlerCallbacks, HandlerCallbacksBuilder};
pub use config::{
    DEFAULT_CHUNK_RETRIES, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT, UpdateConfig, UpdateConfigBuilder,
};
pub use descriptor::{ProgressUpdate, UpdateDescriptor, UpdateDescriptorBuilder};
pub use driver::{DriverCommand, DriverHandle, TokioClock, UpdateDriver};
pub use error::{ErrorCategory, OtaError, OtaResult, StorageError};
pub use handler::{ChunkTimeout, OtaHandler};
pub use session::{FailureDisposition, SessionPhase, SessionState, total_chunks};
pub use status::FirmwareState;
pub use storage::{MemoryStorage, StorageWriter};
