//! # ota-watchdog
//!
//! Request timeout guard for chunked firmware downloads.
//!
//! Every chunk request is covered by a [`TimeoutGuard`]: if the response does
//! not arrive before the deadline the guard fires once and the update handler
//! retries. The guard is deadline based and polled from the host's event
//! loop, which keeps it free of threads and global timer registries.
//!
//! - [`guard`] - the single-shot, cancelable guard
//! - [`clock`] - monotonic and manually advanced time sources

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod clock;
pub mod guard;

pub mod prelude;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use guard::TimeoutGuard;
