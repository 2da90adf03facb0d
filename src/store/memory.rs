use super::{Store, StoreKey};
use crate::errors::StoreError;
use dashmap::DashMap;

/// In-process store backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<StoreKey, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Store for MemoryStore {
    fn write(&self, key: &StoreKey, bytes: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn remove(&self, key: &StoreKey) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn contains(&self, key: &StoreKey) -> bool {
        self.entries.contains_key(key)
    }

    fn take(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        self.entries
            .remove(key)
            .map(|(_, bytes)| bytes)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}
