//! Per-update transfer configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{OtaError, OtaResult};

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default number of retries per chunk.
pub const DEFAULT_CHUNK_RETRIES: u8 = 12;

/// Default time to wait for a chunk response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Chunk size, retry budget and response timeout of an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Size of every requested chunk in bytes.
    pub chunk_size: usize,
    /// Failures tolerated per chunk before the update is given up.
    pub chunk_retries: u8,
    /// Time to wait for a chunk response before requesting it again.
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_retries: DEFAULT_CHUNK_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl UpdateConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk size or timeout is zero.
    pub fn validate(&self) -> OtaResult<()> {
        if self.chunk_size == 0 {
            return Err(OtaError::invalid_configuration(
                "chunk_size must be greater than 0",
            ));
        }
        if self.timeout.is_zero() {
            return Err(OtaError::invalid_configuration(
                "timeout must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the values are invalid.
    pub fn from_json(json: &str) -> OtaResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| OtaError::invalid_configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> UpdateConfigBuilder {
        UpdateConfigBuilder::default()
    }
}

/// Builder for `UpdateConfig`.
#[derive(Debug, Default)]
pub struct UpdateConfigBuilder {
    config: UpdateConfig,
}

impl UpdateConfigBuilder {
    /// Set the chunk size in bytes.
    #[must_use]
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    /// Set the retry budget per chunk.
    #[must_use]
    pub fn chunk_retries(mut self, retries: u8) -> Self {
        self.config.chunk_retries = retries;
        self
    }

    /// Set the chunk response timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> OtaResult<UpdateConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
