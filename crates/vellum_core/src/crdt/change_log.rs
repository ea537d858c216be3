//! Persisted change log of a versioned document.
//!
//! Every edit to a document is one [`ChangeRecord`]: a yrs v1 update plus the
//! hashes of the changes it was made on top of, a timestamp and an optional
//! commit message. Records are content addressed by a SHA-256 over those
//! fields, so the heads of the log identify a document state.
//!
//! This module is the only place that knows how records are laid out in
//! storage. Everything else reads the log through [`ChangeLog::entries`] and
//! [`ChangeLog::updates_for`].

use std::collections::{HashMap, HashSet};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::storage::CrdtStorage;
use crate::error::{MigrationError, NotFoundError, RepositoryError, StoreResult};
use crate::ids::{ChangeHash, DocumentId, Heads};

/// Record format written by this build.
pub const CHANGE_FORMAT_VERSION: u32 = 1;

/// Top-level key segment for document data.
pub(crate) const DOCUMENTS_KEY: &str = "documents";

const CHANGES_KEY: &str = "changes";

fn serialize_update<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

fn deserialize_update<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    BASE64.decode(encoded).map_err(serde::de::Error::custom)
}

/// One persisted change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Record format version.
    pub format: u32,
    /// Position in the log, starting at 0.
    pub seq: u64,
    /// Content hash of this record.
    pub hash: ChangeHash,
    /// Hashes of the changes this one was made on top of.
    pub deps: Vec<ChangeHash>,
    /// Unix timestamp in milliseconds.
    pub time: i64,
    /// Commit message; `None` for ordinary edits.
    pub message: Option<String>,
    /// yrs v1 update. Empty for commits that carry no edit.
    #[serde(
        serialize_with = "serialize_update",
        deserialize_with = "deserialize_update"
    )]
    pub update: Vec<u8>,
}

impl ChangeRecord {
    /// Build a record, computing its hash.
    pub fn new(
        seq: u64,
        deps: Vec<ChangeHash>,
        time: i64,
        message: Option<String>,
        update: Vec<u8>,
    ) -> Self {
        let hash = Self::compute_hash(&deps, time, message.as_deref(), &update);
        Self {
            format: CHANGE_FORMAT_VERSION,
            seq,
            hash,
            deps,
            time,
            message,
            update,
        }
    }

    fn compute_hash(deps: &[ChangeHash], time: i64, message: Option<&str>, update: &[u8]) -> ChangeHash {
        let mut hasher = Sha256::new();
        for dep in deps {
            hasher.update(dep.as_str().as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(time.to_be_bytes());
        match message {
            Some(message) => {
                hasher.update([1u8]);
                hasher.update((message.len() as u64).to_be_bytes());
                hasher.update(message.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update(update);
        let digest: [u8; 32] = hasher.finalize().into();
        ChangeHash::from_digest(&digest)
    }

    fn key_suffix(&self) -> String {
        format!("{:010}", self.seq)
    }
}

/// A change as seen by history derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    /// Hash of the change.
    pub hash: ChangeHash,
    /// Heads of the document right after this change.
    pub heads: Heads,
    /// Unix timestamp in milliseconds.
    pub time: i64,
    /// Commit message, if any.
    pub message: Option<String>,
}

/// The ordered change log of one document.
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    records: Vec<ChangeRecord>,
    heads: Heads,
}

impl ChangeLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from records in any order.
    pub fn from_records(mut records: Vec<ChangeRecord>) -> StoreResult<Self> {
        records.sort_by_key(|r| r.seq);
        let mut log = Self::new();
        for record in records {
            if record.format != CHANGE_FORMAT_VERSION {
                return Err(MigrationError::new(format!(
                    "change record format v{} is not supported (expected v{}); manual migration required",
                    record.format, CHANGE_FORMAT_VERSION
                ))
                .into());
            }
            log.push(record);
        }
        Ok(log)
    }

    /// Load the log of `id`. A document with no records is [`NotFoundError`].
    pub fn load(storage: &dyn CrdtStorage, id: DocumentId) -> StoreResult<Self> {
        let doc_key = id.key();
        let entries = storage.load_range(&[DOCUMENTS_KEY, doc_key.as_str(), CHANGES_KEY])?;
        if entries.is_empty() {
            return Err(NotFoundError::new(format!("document {id} not found")).into());
        }
        let records = entries
            .into_iter()
            .map(|entry| {
                serde_json::from_slice::<ChangeRecord>(&entry.value).map_err(|e| {
                    RepositoryError::new(format!(
                        "corrupt change record {}: {e}",
                        entry.key.join("/")
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_records(records)
    }

    /// Persist one record of `id`.
    pub fn save_record(
        storage: &dyn CrdtStorage,
        id: DocumentId,
        record: &ChangeRecord,
    ) -> StoreResult<()> {
        let value = serde_json::to_vec(record)
            .map_err(|e| RepositoryError::new(format!("failed to encode change record: {e}")))?;
        storage.save(
            &[
                DOCUMENTS_KEY,
                id.key().as_str(),
                CHANGES_KEY,
                record.key_suffix().as_str(),
            ],
            &value,
        )?;
        Ok(())
    }

    /// Append a record in memory.
    pub fn push(&mut self, record: ChangeRecord) {
        for dep in &record.deps {
            self.heads.remove(dep);
        }
        self.heads.insert(record.hash.clone());
        self.records.push(record);
    }

    /// Append a new change on top of the current heads and return it.
    pub fn append(&mut self, message: Option<String>, update: Vec<u8>) -> ChangeRecord {
        let deps: Vec<ChangeHash> = self.heads.iter().cloned().collect();
        let record = ChangeRecord::new(
            self.records.len() as u64,
            deps,
            chrono::Utc::now().timestamp_millis(),
            message,
            update,
        );
        self.push(record.clone());
        record
    }

    /// Current heads.
    pub fn heads(&self) -> &Heads {
        &self.heads
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every change in log order, with the heads right after it.
    pub fn entries(&self) -> Vec<ChangeEntry> {
        let mut heads = Heads::new();
        self.records
            .iter()
            .map(|record| {
                for dep in &record.deps {
                    heads.remove(dep);
                }
                heads.insert(record.hash.clone());
                ChangeEntry {
                    hash: record.hash.clone(),
                    heads: heads.clone(),
                    time: record.time,
                    message: record.message.clone(),
                }
            })
            .collect()
    }

    /// The updates needed to rebuild the state at `heads`, in log order.
    ///
    /// Fails with [`NotFoundError`] if a head is not in the log.
    pub fn updates_for(&self, heads: &Heads) -> StoreResult<Vec<&[u8]>> {
        let by_hash: HashMap<&ChangeHash, &ChangeRecord> =
            self.records.iter().map(|r| (&r.hash, r)).collect();

        let mut included: HashSet<&ChangeHash> = HashSet::new();
        let mut pending: Vec<&ChangeHash> = heads.iter().collect();
        while let Some(hash) = pending.pop() {
            if !included.insert(hash) {
                continue;
            }
            let record = by_hash
                .get(hash)
                .ok_or_else(|| NotFoundError::new(format!("change {hash} not found")))?;
            pending.extend(record.deps.iter());
        }

        Ok(self
            .records
            .iter()
            .filter(|r| included.contains(&r.hash) && !r.update.is_empty())
            .map(|r| r.update.as_slice())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::MemoryStorage;
    use crate::error::StoreError;

    #[test]
    fn test_append_tracks_linear_heads() {
        let mut log = ChangeLog::new();
        let first = log.append(None, vec![1]);
        let second = log.append(Some("commit".to_string()), Vec::new());

        assert_eq!(second.deps, vec![first.hash.clone()]);
        assert_eq!(log.heads().len(), 1);
        assert!(log.heads().contains(&second.hash));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].heads.contains(&first.hash));
        assert_eq!(entries[1].message.as_deref(), Some("commit"));
    }

    #[test]
    fn test_hash_covers_message() {
        let a = ChangeRecord::new(0, Vec::new(), 1, Some("a".to_string()), Vec::new());
        let b = ChangeRecord::new(0, Vec::new(), 1, Some("b".to_string()), Vec::new());
        let none = ChangeRecord::new(0, Vec::new(), 1, None, Vec::new());
        assert_ne!(a.hash, b.hash);
        assert_ne!(a.hash, none.hash);
    }

    #[test]
    fn test_persist_and_reload() {
        let storage = MemoryStorage::new();
        let id = DocumentId::new();
        let mut log = ChangeLog::new();
        for i in 0..12u8 {
            let record = log.append(None, vec![i]);
            ChangeLog::save_record(&storage, id, &record).unwrap();
        }

        let loaded = ChangeLog::load(&storage, id).unwrap();
        assert_eq!(loaded.len(), 12);
        assert_eq!(loaded.heads(), log.heads());
        assert_eq!(loaded.updates_for(loaded.heads()).unwrap().len(), 12);
    }

    #[test]
    fn test_missing_document_is_not_found() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            ChangeLog::load(&storage, DocumentId::new()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_format_is_migration_error() {
        let mut record = ChangeRecord::new(0, Vec::new(), 0, None, vec![1]);
        record.format = CHANGE_FORMAT_VERSION + 1;
        assert!(matches!(
            ChangeLog::from_records(vec![record]),
            Err(StoreError::Migration(_))
        ));
    }

    #[test]
    fn test_updates_for_prefix_state() {
        let mut log = ChangeLog::new();
        let first = log.append(None, vec![10]);
        log.append(None, vec![20]);

        let heads: Heads = [first.hash].into_iter().collect();
        assert_eq!(log.updates_for(&heads).unwrap(), vec![&[10u8][..]]);

        let unknown: Heads = [ChangeHash::from_digest(&[0; 32])].into_iter().collect();
        assert!(matches!(
            log.updates_for(&unknown),
            Err(StoreError::NotFound(_))
        ));
    }
}
