//! Content fingerprints for idempotent synchronization
//!
//! A fingerprint identifies a memory by what it says, not when it was
//! stored: the same `(source, role, text)` always hashes to the same
//! value, so repeated sync runs can detect already-persisted items.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::schema::MemoryMetadata;

/// Content fingerprint (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by [`Fingerprint::from_parts`] or validated
/// via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a memory's identifying parts.
    ///
    /// Components are length-prefixed by marker bytes and NUL-separated
    /// so that ("ab", "c") and ("a", "bc") cannot collide.
    pub fn from_parts(source: &str, role: &str, text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"S:");
        hasher.update(source.as_bytes());
        hasher.update(b"\0");
        hasher.update(b"R:");
        hasher.update(role.as_bytes());
        hasher.update(b"\0");
        hasher.update(b"T:");
        hasher.update(text.as_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }

    /// Fingerprint of a memory as the store would record it: `source`
    /// and `role` (falling back to `type`) are read from the metadata.
    /// This is the single computation shared by insert and sync.
    pub fn of_memory(text: &str, metadata: &MemoryMetadata) -> Self {
        let source = metadata
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let role = metadata
            .get("role")
            .or_else(|| metadata.get("type"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        Self::from_parts(source, role, text)
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = StoreError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StoreError::InvalidFingerprint { fingerprint: s });
        }
        Ok(Fingerprint(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_parts_same_fingerprint() {
        let a = Fingerprint::from_parts("chat_history", "user", "hello");
        let b = Fingerprint::from_parts("chat_history", "user", "hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_role_different_fingerprint() {
        let a = Fingerprint::from_parts("chat_history", "user", "hello");
        let b = Fingerprint::from_parts("chat_history", "assistant", "hello");
        assert_ne!(a, b);
    }

    #[test]
    fn boundary_shifts_do_not_collide() {
        let a = Fingerprint::from_parts("ab", "c", "x");
        let b = Fingerprint::from_parts("a", "bc", "x");
        assert_ne!(a, b);
    }

    #[test]
    fn try_from_validates_hex() {
        let valid = "a".repeat(64);
        assert!(Fingerprint::try_from(valid).is_ok());
        assert!(Fingerprint::try_from("zzz".to_string()).is_err());
        assert!(Fingerprint::try_from("ab".to_string()).is_err());
    }

    #[test]
    fn of_memory_reads_source_and_role() {
        let mut metadata = MemoryMetadata::new();
        metadata.insert("source".into(), "chat_history".into());
        metadata.insert("role".into(), "user".into());
        let from_meta = Fingerprint::of_memory("hello", &metadata);
        let direct = Fingerprint::from_parts("chat_history", "user", "hello");
        assert_eq!(from_meta, direct);
    }

    #[test]
    fn of_memory_falls_back_to_type() {
        let mut metadata = MemoryMetadata::new();
        metadata.insert("source".into(), "core_memory".into());
        metadata.insert("type".into(), "persona".into());
        let from_meta = Fingerprint::of_memory("persona text", &metadata);
        let direct = Fingerprint::from_parts("core_memory", "persona", "persona text");
        assert_eq!(from_meta, direct);
    }
}
