//! Storage abstraction for CRDT persistence.
//!
//! [`CrdtStorage`] is a hierarchical key/value store: a key is a list of parts,
//! persisted `/`-joined, and range operations act on every key that has a given
//! list of parts as a prefix. Parts may not be empty or contain `/`.

use crate::error::{StorageResult, ValidationError};

/// Table used by SQLite-backed storage when none is configured.
pub const DEFAULT_TABLE: &str = "crdt_chunks";

/// Separator used to join key parts.
pub const KEY_SEPARATOR: char = '/';

/// A stored entry returned by range loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// The key parts.
    pub key: Vec<String>,
    /// The stored bytes.
    pub value: Vec<u8>,
}

/// Trait for CRDT key/value storage backends.
///
/// Implementations handle persisting binary chunks (change records, project
/// state, index entries) to various backends (SQLite for native, memory for
/// tests).
pub trait CrdtStorage: Send + Sync {
    /// Load the value stored under `key`, or `None`.
    fn load(&self, key: &[&str]) -> StorageResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn save(&self, key: &[&str], value: &[u8]) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &[&str]) -> StorageResult<()>;

    /// Load every entry whose key starts with `prefix`, sorted by joined key.
    ///
    /// An empty prefix loads everything.
    fn load_range(&self, prefix: &[&str]) -> StorageResult<Vec<StorageEntry>>;

    /// Remove every entry whose key starts with `prefix`.
    fn remove_range(&self, prefix: &[&str]) -> StorageResult<()>;
}

/// Validate and join key parts. Empty keys are rejected.
pub fn join_key(key: &[&str]) -> StorageResult<String> {
    if key.is_empty() {
        return Err(ValidationError::new("storage key must have at least one part").into());
    }
    join_prefix(key)
}

/// Validate and join a range prefix. An empty prefix joins to `""`.
pub fn join_prefix(prefix: &[&str]) -> StorageResult<String> {
    for part in prefix {
        if part.is_empty() {
            return Err(ValidationError::new("storage key parts must not be empty").into());
        }
        if part.contains(KEY_SEPARATOR) {
            return Err(ValidationError::new(format!(
                "storage key part '{part}' must not contain '{KEY_SEPARATOR}'"
            ))
            .into());
        }
    }
    Ok(prefix.join("/"))
}

/// Split a joined key back into its parts.
pub fn split_key(joined: &str) -> Vec<String> {
    joined.split(KEY_SEPARATOR).map(str::to_string).collect()
}

/// Whether the joined `key` falls inside the range named by the joined `prefix`.
pub(crate) fn in_range(key: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || key == prefix
        || (key.starts_with(prefix) && key[prefix.len()..].starts_with(KEY_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_join_key_validation() {
        assert_eq!(join_key(&["a", "b"]).unwrap(), "a/b");
        assert!(matches!(join_key(&[]), Err(StorageError::Validation(_))));
        assert!(matches!(
            join_key(&["a/b"]),
            Err(StorageError::Validation(_))
        ));
        assert!(matches!(join_key(&["a", ""]), Err(StorageError::Validation(_))));
        assert_eq!(join_prefix(&[]).unwrap(), "");
    }

    #[test]
    fn test_in_range_matches_whole_parts() {
        assert!(in_range("doc/changes/1", "doc"));
        assert!(in_range("doc", "doc"));
        assert!(!in_range("document/x", "doc"));
        assert!(in_range("anything", ""));
        assert_eq!(split_key("a/b/c"), vec!["a", "b", "c"]);
    }
}
