//! Content fingerprints.

use std::fmt;

use detection::ContentUnit;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable hash of a content unit's `(subject, body)`.
///
/// Each field is length-prefixed before hashing so field boundaries are part
/// of the identity: `("ab", "c")` and `("a", "bc")` differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn of(unit: &ContentUnit) -> Self {
        let mut hasher = Sha256::new();
        for field in [&unit.subject, &unit.body] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}
