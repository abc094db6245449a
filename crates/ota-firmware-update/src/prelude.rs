//! Prelude module for convenient imports

pub use crate::callbacks::HandlerCallbacks;
pub use crate::config::UpdateConfig;
pub use crate::descriptor::{ProgressUpdate, UpdateDescriptor};
pub use crate::driver::{DriverHandle, TokioClock, UpdateDriver};
pub use crate::error::{ErrorCategory, OtaError, OtaResult, StorageError};
pub use crate::handler::{ChunkTimeout, OtaHandler};
pub use crate::session::{FailureDisposition, SessionPhase};
pub use crate::status::FirmwareState;
pub use crate::storage::{MemoryStorage, StorageWriter};

pub use ota_digest::{DigestAlgorithm, DigestEncoding, compute_digest};
pub use ota_watchdog::{Clock, ManualClock, MonotonicClock};
