//! Firmware update states reported to the update server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State names sent through the status report callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FirmwareState {
    /// A chunk response is being processed
    Downloading,
    /// All chunks have been received
    Downloaded,
    /// The image checksum matched
    Verified,
    /// The image has been finalized and is about to be applied
    Updating,
    /// The new firmware is running
    Updated,
    /// The current attempt failed
    Failed,
}

impl FirmwareState {
    /// Wire name of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downloading => "DOWNLOADING",
            Self::Downloaded => "DOWNLOADED",
            Self::Verified => "VERIFIED",
            Self::Updating => "UPDATING",
            Self::Updated => "UPDATED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for FirmwareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
