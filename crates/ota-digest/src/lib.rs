//! Incremental checksums for chunked firmware downloads.
//!
//! Update servers announce the checksum of a firmware image together with the
//! name of the algorithm that produced it. The image then arrives piecewise,
//! so the device hashes each chunk as it is written to flash and compares the
//! result once the last chunk has been stored.
//!
//! - [`algorithm`]: algorithm identifiers and digest text encodings
//! - [`accumulator`]: the restartable incremental digest
//! - [`error`]: error types
//!
//! # Example
//!
//! ```
//! use ota_digest::prelude::*;
//!
//! # fn main() -> Result<(), DigestError> {
//! let algorithm: DigestAlgorithm = "SHA256".parse()?;
//! let mut digest = DigestAccumulator::new();
//! digest.start(algorithm);
//! for chunk in b"firmware image".chunks(4) {
//!     digest.update(chunk)?;
//! }
//! let actual = digest.finalize()?;
//! assert_eq!(actual, compute_digest(algorithm, DigestEncoding::Hex, b"firmware image"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod accumulator;
pub mod algorithm;
pub mod error;
pub mod prelude;

pub use accumulator::{DigestAccumulator, compute_digest, digests_match};
pub use algorithm::{DigestAlgorithm, DigestEncoding};
pub use error::{DigestError, DigestResult};
