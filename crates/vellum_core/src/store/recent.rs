//! Persisted index of recently changed documents.

use std::sync::Arc;

use super::types::RecentDocument;
use crate::crdt::CrdtStorage;
use crate::error::{RepositoryError, StoreResult};
use crate::ids::DocumentId;

const INDEX_KEY: &str = "index";
const RECENT_KEY: &str = "recent";

/// Recent-documents index stored next to the documents themselves.
///
/// One entry per document under `index/recent/<uuid>`; recording a document
/// again replaces its entry.
#[derive(Clone)]
pub struct RecentDocuments {
    storage: Arc<dyn CrdtStorage>,
}

impl RecentDocuments {
    /// Index backed by `storage`.
    pub fn new(storage: Arc<dyn CrdtStorage>) -> Self {
        Self { storage }
    }

    /// Record that `id` changed now.
    pub fn record(&self, id: DocumentId, title: &str) -> StoreResult<()> {
        let entry = RecentDocument {
            id,
            title: title.to_string(),
            opened_at: chrono::Utc::now().timestamp_millis(),
        };
        let value = serde_json::to_vec(&entry)
            .map_err(|e| RepositoryError::new(format!("failed to encode recent entry: {e}")))?;
        let key = id.key();
        self.storage
            .save(&[INDEX_KEY, RECENT_KEY, key.as_str()], &value)?;
        Ok(())
    }

    /// Up to `limit` entries, most recently changed first.
    pub fn list(&self, limit: usize) -> StoreResult<Vec<RecentDocument>> {
        let mut entries = self
            .storage
            .load_range(&[INDEX_KEY, RECENT_KEY])?
            .into_iter()
            .map(|entry| {
                serde_json::from_slice::<RecentDocument>(&entry.value).map_err(|e| {
                    RepositoryError::new(format!(
                        "corrupt recent entry {}: {e}",
                        entry.key.join("/")
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Drop `id` from the index. Missing entries are ignored.
    pub fn remove(&self, id: DocumentId) -> StoreResult<()> {
        let key = id.key();
        self.storage.remove(&[INDEX_KEY, RECENT_KEY, key.as_str()])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::MemoryStorage;

    #[test]
    fn test_record_list_remove() {
        let recent = RecentDocuments::new(Arc::new(MemoryStorage::new()));
        let a = DocumentId::new();
        let b = DocumentId::new();
        recent.record(a, "a.md").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        recent.record(b, "b.md").unwrap();

        let listed = recent.list(10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, b);
        assert_eq!(recent.list(1).unwrap().len(), 1);

        recent.remove(b).unwrap();
        let listed = recent.list(10).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "a.md");
    }

    #[test]
    fn test_recording_again_replaces_entry() {
        let recent = RecentDocuments::new(Arc::new(MemoryStorage::new()));
        let id = DocumentId::new();
        recent.record(id, "old").unwrap();
        recent.record(id, "new").unwrap();
        let listed = recent.list(10).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "new");
    }
}
