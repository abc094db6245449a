//! Convenience re-exports for common digest types

pub use crate::accumulator::{DigestAccumulator, compute_digest, digests_match};
pub use crate::algorithm::{DigestAlgorithm, DigestEncoding};
pub use crate::error::{DigestError, DigestResult};
