//! Preshared key table.
//!
//! Payload securing uses 128-bit symmetric keys selected by a 16-bit key
//! number. The table is populated once at process start, then handed to
//! sessions behind an `Arc` and never mutated again, so every session
//! observes a consistent view without locking. Key bytes are zeroized on
//! drop.

use std::collections::HashMap;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::KEY_SIZE;

/// A 128-bit preshared symmetric key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes.
    ///
    /// Handle with care - this exposes sensitive key material.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

// Key material must never end up in logs.
impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Read-only mapping from key number to preshared key.
///
/// Append-only during startup, immutable afterwards; share it between
/// sessions with `Arc<KeyTable>`. Key number 0 conventionally means
/// "unsecured" and is never looked up by the engine.
#[derive(Debug, Default)]
pub struct KeyTable {
    keys: HashMap<u16, SymmetricKey>,
}

impl KeyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key under the given number (startup population).
    pub fn insert(&mut self, key_number: u16, key: SymmetricKey) {
        self.keys.insert(key_number, key);
    }

    /// Look up the key for a key number.
    pub fn lookup(&self, key_number: u16) -> Result<&SymmetricKey, KeyError> {
        self.keys
            .get(&key_number)
            .ok_or(KeyError::UnknownKeyNumber(key_number))
    }

    /// Whether the table holds an entry for the key number.
    pub fn contains(&self, key_number: u16) -> bool {
        self.keys.contains_key(&key_number)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<(u16, SymmetricKey)> for KeyTable {
    fn from_iter<I: IntoIterator<Item = (u16, SymmetricKey)>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// Errors from key material lookup.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    /// No key registered under the requested number.
    #[error("unknown key number: {0}")]
    UnknownKeyNumber(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fill: u8) -> SymmetricKey {
        SymmetricKey::from_bytes([fill; KEY_SIZE])
    }

    #[test]
    fn test_lookup_known_key() {
        let table: KeyTable = [(1, key(0x11)), (2, key(0x22))].into_iter().collect();

        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup(2).unwrap().as_bytes(), &[0x22; KEY_SIZE]);
    }

    #[test]
    fn test_lookup_absent_key_is_an_error() {
        let table = KeyTable::new();
        assert_eq!(table.lookup(5).unwrap_err(), KeyError::UnknownKeyNumber(5));
    }

    #[test]
    fn test_insert_then_contains() {
        let mut table = KeyTable::new();
        assert!(table.is_empty());

        table.insert(7, key(0xAB));
        assert!(table.contains(7));
        assert!(!table.contains(8));
    }

    #[test]
    fn test_debug_does_not_leak_key_bytes() {
        let rendered = format!("{:?}", key(0x5A));
        assert!(!rendered.contains("5a"));
        assert!(!rendered.contains("90")); // 0x5A = 90 decimal
    }
}
