//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use ota_test_helpers::prelude::*;
//! ```

pub use crate::must::{must, must_async, must_some, must_with};

#[cfg(feature = "mock")]
pub use crate::mock::{HostEvent, MockStorage, RecordingHost};

#[cfg(feature = "fixtures")]
pub use crate::fixtures::{UpdateFixture, firmware_image, sha256_hex};

/// Return type for tests that propagate errors with `?`.
pub type TestResult = Result<(), Box<dyn std::error::Error>>;
