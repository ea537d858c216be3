//! In-memory storage implementation for testing.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::storage::{CrdtStorage, StorageEntry, in_range, join_key, join_prefix, split_key};
use crate::error::StorageResult;

/// In-memory CRDT storage.
///
/// Thread-safe via `RwLock`, but data is lost when dropped. Clones share the
/// same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl CrdtStorage for MemoryStorage {
    fn load(&self, key: &[&str]) -> StorageResult<Option<Vec<u8>>> {
        let key = join_key(key)?;
        Ok(self.entries.read().unwrap().get(&key).cloned())
    }

    fn save(&self, key: &[&str], value: &[u8]) -> StorageResult<()> {
        let key = join_key(key)?;
        self.entries.write().unwrap().insert(key, value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[&str]) -> StorageResult<()> {
        let key = join_key(key)?;
        self.entries.write().unwrap().remove(&key);
        Ok(())
    }

    fn load_range(&self, prefix: &[&str]) -> StorageResult<Vec<StorageEntry>> {
        let prefix = join_prefix(prefix)?;
        let entries = self.entries.read().unwrap();
        Ok(entries
            .iter()
            .filter(|(key, _)| in_range(key, &prefix))
            .map(|(key, value)| StorageEntry {
                key: split_key(key),
                value: value.clone(),
            })
            .collect())
    }

    fn remove_range(&self, prefix: &[&str]) -> StorageResult<()> {
        let prefix = join_prefix(prefix)?;
        self.entries
            .write()
            .unwrap()
            .retain(|key, _| !in_range(key, &prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_remove() {
        let storage = MemoryStorage::new();
        storage.save(&["doc", "state"], b"v1").unwrap();
        assert_eq!(storage.load(&["doc", "state"]).unwrap(), Some(b"v1".to_vec()));

        storage.save(&["doc", "state"], b"v2").unwrap();
        assert_eq!(storage.load(&["doc", "state"]).unwrap(), Some(b"v2".to_vec()));

        storage.remove(&["doc", "state"]).unwrap();
        assert!(storage.load(&["doc", "state"]).unwrap().is_none());
        storage.remove(&["doc", "state"]).unwrap();
    }

    #[test]
    fn test_ranges_respect_part_boundaries() {
        let storage = MemoryStorage::new();
        storage.save(&["doc", "a"], b"1").unwrap();
        storage.save(&["doc", "b"], b"2").unwrap();
        storage.save(&["docs", "c"], b"3").unwrap();

        let range = storage.load_range(&["doc"]).unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].key, vec!["doc", "a"]);

        storage.remove_range(&["doc"]).unwrap();
        assert_eq!(storage.len(), 1);
        assert!(storage.load(&["docs", "c"]).unwrap().is_some());
    }
}
