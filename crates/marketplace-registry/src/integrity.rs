//! Content checksums.
//!
//! Every published version carries the SHA-256 of its content. The checksum
//! is a pure function of the bytes: a mismatch against stored content is a
//! corruption signal and is reported, never repaired.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Signature recorded for versions published without one.
pub const UNSIGNED: &str = "unsigned";

/// A content checksum (SHA-256 lowercase hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Compute the SHA-256 checksum of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Checksum(hex_encode(&hasher.finalize()))
    }

    #[cfg(test)]
    pub(crate) fn from_hex(hex: impl Into<String>) -> Self {
        Checksum(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that the given data matches this checksum.
    pub fn verify(&self, data: &[u8]) -> bool {
        Checksum::compute(data) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Outcome of re-hashing stored content against its recorded checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentCheck {
    Intact,
    Drifted { expected: Checksum, actual: Checksum },
}

impl ContentCheck {
    pub fn is_intact(&self) -> bool {
        matches!(self, ContentCheck::Intact)
    }
}

/// Re-hash `content` and compare it with `expected`.
pub fn check_content(expected: &Checksum, content: &[u8]) -> ContentCheck {
    let actual = Checksum::compute(content);
    if actual == *expected {
        ContentCheck::Intact
    } else {
        ContentCheck::Drifted {
            expected: expected.clone(),
            actual,
        }
    }
}
