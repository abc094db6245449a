//! Checksum algorithm identifiers and digest text encodings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DigestError;

/// Checksum algorithm used to verify a complete firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DigestAlgorithm {
    /// SHA-256 (the default for most update servers)
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
    /// CRC-32 (IEEE), rendered big-endian
    Crc32,
    /// MD5, still announced by some update servers
    Md5,
}

impl DigestAlgorithm {
    /// Canonical identifier, as sent by update servers.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
            Self::Crc32 => "CRC32",
            Self::Md5 => "MD5",
        }
    }

    /// Length of the raw digest in bytes.
    #[must_use]
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
            Self::Crc32 => 4,
            Self::Md5 => 16,
        }
    }

    /// All algorithms that can be computed.
    #[must_use]
    pub fn all() -> [Self; 5] {
        [Self::Sha256, Self::Sha384, Self::Sha512, Self::Crc32, Self::Md5]
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Recognised by update servers, but no implementation is linked in.
const UNSUPPORTED: &[&str] = &["MURMUR332", "MURMUR3128"];

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            "CRC32" => Ok(Self::Crc32),
            "MD5" => Ok(Self::Md5),
            other if UNSUPPORTED.contains(&other) => Err(DigestError::unsupported(s.trim())),
            _ => Err(DigestError::unknown(s.trim())),
        }
    }
}

/// Text encoding of a finished digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestEncoding {
    /// Lower-case hexadecimal
    #[default]
    Hex,
    /// Standard base64 alphabet with padding
    Base64,
}

impl DigestEncoding {
    /// Encode raw digest bytes.
    #[must_use]
    pub fn encode(self, raw: &[u8]) -> String {
        match self {
            Self::Hex => hex::encode(raw),
            Self::Base64 => {
                use base64::{Engine as _, engine::general_purpose::STANDARD};
                STANDARD.encode(raw)
            }
        }
    }
}
