//! Lane keys and the state/result derivation rules.

use sha2::{Digest, Sha256};
use std::fmt;

/// Number of lanes tracked per entity unless configured otherwise.
pub const DEFAULT_LANES: u32 = 3;

/// State assumed for a lane that has never been written.
pub const INITIAL_STATE: &str = "initial";

/// Result assumed for a lane that has never been written.
pub const NO_RESULT: &str = "none";

const SEPARATOR: char = ':';

/// An entity identifier combined with a lane index: `<entityId>:<lane>`.
///
/// Unique only as the pair; two entities may produce the same scoped key if
/// their identifiers themselves contain the separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedKey {
    key: String,
    lane: u32,
}

impl ScopedKey {
    /// Derives the scoped key for a lane of an entity.
    #[must_use]
    pub fn new(entity_id: &str, lane: u32) -> Self {
        Self {
            key: format!("{entity_id}{SEPARATOR}{lane}"),
            lane,
        }
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Returns the lane index.
    #[must_use]
    pub fn lane(&self) -> u32 {
        self.lane
    }
}

impl fmt::Display for ScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl AsRef<str> for ScopedKey {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

/// Stable fingerprint of a string: the first 8 bytes of its SHA-256, in hex.
#[must_use]
pub fn fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(&digest[..8])
}

/// Appends `:<payload_len>:<lane>` to the previous state.
#[must_use]
pub fn next_state(previous: &str, payload_len: usize, lane: u32) -> String {
    format!("{previous}{SEPARATOR}{payload_len}{SEPARATOR}{lane}")
}

/// Chains the new state's fingerprint onto the previous result's.
#[must_use]
pub fn next_result(key: &ScopedKey, new_state: &str, previous_result: &str) -> String {
    format!(
        "{key}{SEPARATOR}{}{SEPARATOR}{}",
        fingerprint(new_state),
        fingerprint(previous_result)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_key() {
        let key = ScopedKey::new("e1", 2);
        assert_eq!(key.as_str(), "e1:2");
        assert_eq!(key.to_string(), "e1:2");
        assert_eq!(key.lane(), 2);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint("none"), fingerprint("none"));
        assert_eq!(fingerprint("").len(), 16);
        // SHA-256("") starts with e3b0c44298fc1c14.
        assert_eq!(fingerprint(""), "e3b0c44298fc1c14");
        assert_ne!(fingerprint("initial:10:0"), fingerprint("initial:10:1"));
    }

    #[test]
    fn test_next_state_accumulates() {
        let first = next_state(INITIAL_STATE, 10, 0);
        assert_eq!(first, "initial:10:0");
        assert_eq!(next_state(&first, 7, 0), "initial:10:0:7:0");
    }

    #[test]
    fn test_next_result_shape() {
        let key = ScopedKey::new("e1", 0);
        let result = next_result(&key, "initial:10:0", NO_RESULT);
        assert_eq!(
            result,
            format!("e1:0:{}:{}", fingerprint("initial:10:0"), fingerprint("none"))
        );
    }
}
