//! Incremental digest over a firmware image received in chunks.
//!
//! A [`DigestAccumulator`] is owned by the update handler for its whole
//! lifetime and restarted for every download attempt, so `start` must fully
//! discard whatever a previous (finished or aborted) attempt left behind.

use md5::Md5;
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::{debug, trace};

use crate::algorithm::{DigestAlgorithm, DigestEncoding};
use crate::error::{DigestError, DigestResult};

enum Hasher {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
    Crc32(crc32fast::Hasher),
    Md5(Md5),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Sha384 => Self::Sha384(Sha384::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
            DigestAlgorithm::Crc32 => Self::Crc32(crc32fast::Hasher::new()),
            DigestAlgorithm::Md5 => Self::Md5(Md5::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Crc32(h) => h.update(data),
            Self::Md5(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha384(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
            Self::Crc32(h) => h.finalize().to_be_bytes().to_vec(),
            Self::Md5(h) => h.finalize().to_vec(),
        }
    }
}

struct Running {
    algorithm: DigestAlgorithm,
    hasher: Hasher,
    processed: u64,
}

/// Restartable, incremental checksum computation.
///
/// # Example
///
/// ```
/// use ota_digest::prelude::*;
///
/// # fn main() -> Result<(), DigestError> {
/// let mut digest = DigestAccumulator::new();
/// digest.start(DigestAlgorithm::Sha256);
/// digest.update(b"a")?;
/// digest.update(b"bc")?;
/// assert_eq!(
///     digest.finalize()?,
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// # Ok(())
/// # }
/// ```
pub struct DigestAccumulator {
    encoding: DigestEncoding,
    running: Option<Running>,
}

impl DigestAccumulator {
    /// Create an idle accumulator producing hex digests.
    #[must_use]
    pub fn new() -> Self {
        Self::with_encoding(DigestEncoding::Hex)
    }

    /// Create an idle accumulator producing digests in `encoding`.
    #[must_use]
    pub fn with_encoding(encoding: DigestEncoding) -> Self {
        Self {
            encoding,
            running: None,
        }
    }

    /// Change the text encoding used by the next `finalize`.
    pub fn set_encoding(&mut self, encoding: DigestEncoding) {
        self.encoding = encoding;
    }

    /// Text encoding of finished digests.
    #[must_use]
    pub fn encoding(&self) -> DigestEncoding {
        self.encoding
    }

    /// Begin a new computation, discarding any previous state.
    pub fn start(&mut self, algorithm: DigestAlgorithm) {
        if let Some(previous) = self.running.take() {
            debug!(
                algorithm = %previous.algorithm,
                processed = previous.processed,
                "Discarding unfinished digest"
            );
        }
        self.running = Some(Running {
            algorithm,
            hasher: Hasher::new(algorithm),
            processed: 0,
        });
    }

    /// Feed the next slice of the image.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::NotStarted`] when no computation is running and
    /// [`DigestError::LengthOverflow`] if the byte counter would overflow.
    pub fn update(&mut self, data: &[u8]) -> DigestResult<()> {
        let running = self.running.as_mut().ok_or(DigestError::NotStarted)?;
        let len = u64::try_from(data.len()).map_err(|_e| DigestError::LengthOverflow {
            processed: running.processed,
        })?;
        let processed = running
            .processed
            .checked_add(len)
            .ok_or(DigestError::LengthOverflow {
                processed: running.processed,
            })?;

        running.hasher.update(data);
        running.processed = processed;
        trace!(len, processed, "Digest updated");
        Ok(())
    }

    /// Finish the computation and return the encoded digest.
    ///
    /// The accumulator is idle afterwards and must be started again.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::NotStarted`] when no computation is running.
    pub fn finalize(&mut self) -> DigestResult<String> {
        let running = self.running.take().ok_or(DigestError::NotStarted)?;
        let raw = running.hasher.finalize();
        Ok(self.encoding.encode(&raw))
    }

    /// Whether a computation is running.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    /// Algorithm of the running computation.
    #[must_use]
    pub fn algorithm(&self) -> Option<DigestAlgorithm> {
        self.running.as_ref().map(|r| r.algorithm)
    }

    /// Bytes fed since the last `start`.
    #[must_use]
    pub fn bytes_processed(&self) -> u64 {
        self.running.as_ref().map_or(0, |r| r.processed)
    }
}

impl Default for DigestAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DigestAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestAccumulator")
            .field("encoding", &self.encoding)
            .field("algorithm", &self.algorithm())
            .field("processed", &self.bytes_processed())
            .finish()
    }
}

/// Compute the encoded digest of `data` in one call.
#[must_use]
pub fn compute_digest(algorithm: DigestAlgorithm, encoding: DigestEncoding, data: &[u8]) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    encoding.encode(&hasher.finalize())
}

/// Compare an expected digest string with a computed one.
///
/// Comparison is exact: the expected digest must use the same encoding
/// (including hex letter case) as the accumulator.
#[must_use]
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected == actual
}
