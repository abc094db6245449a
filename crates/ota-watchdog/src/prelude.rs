//! Prelude for ota-watchdog.
//!
//! # Example
//!
//! ```rust
//! use ota_watchdog::prelude::*;
//! use std::time::Duration;
//!
//! let mut guard: TimeoutGuard<u32> = TimeoutGuard::new();
//! guard.arm(Duration::from_secs(5), 0);
//! assert!(guard.is_armed());
//! ```

pub use crate::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::guard::TimeoutGuard;
