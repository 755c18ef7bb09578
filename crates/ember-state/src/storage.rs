//! Per-account key-value storage

use ember_primitives::U256;
use std::collections::HashMap;

/// An account's persistent `U256 -> U256` store.
///
/// Absent keys read as zero; storing zero is the caller's signal to remove
/// the key instead.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Storage {
    slots: HashMap<U256, U256>,
}

impl Storage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a slot; absent keys yield zero.
    pub fn load(&self, key: U256) -> U256 {
        self.slots.get(&key).copied().unwrap_or(U256::ZERO)
    }

    /// Writes a slot.
    pub fn store(&mut self, key: U256, value: U256) {
        self.slots.insert(key, value);
    }

    /// Whether the key is present.
    pub fn exists(&self, key: U256) -> bool {
        self.slots.contains_key(&key)
    }

    /// Removes a key, reporting whether it was present.
    pub fn remove(&mut self, key: U256) -> bool {
        self.slots.remove(&key).is_some()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_key_reads_zero() {
        let storage = Storage::new();
        assert_eq!(storage.load(U256::from(42u64)), U256::ZERO);
        assert!(!storage.exists(U256::from(42u64)));
    }

    #[test]
    fn test_store_load_remove() {
        let mut storage = Storage::new();
        let key = U256::from(1u64);

        storage.store(key, U256::from(99u64));
        assert!(storage.exists(key));
        assert_eq!(storage.load(key), U256::from(99u64));

        assert!(storage.remove(key));
        assert!(!storage.exists(key));
        assert_eq!(storage.load(key), U256::ZERO);
        assert!(!storage.remove(key));
    }

    #[test]
    fn test_len() {
        let mut storage = Storage::new();
        assert!(storage.is_empty());
        storage.store(U256::ONE, U256::ONE);
        storage.store(U256::from(2u64), U256::ONE);
        storage.store(U256::ONE, U256::from(3u64));
        assert_eq!(storage.len(), 2);
    }
}
