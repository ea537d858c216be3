//! Versioned documents backed by a yrs doc and a change log.
//!
//! A [`DocumentHandle`] holds a document's [`ChangeLog`] and the yrs state
//! materialised from it. The yrs doc has a `Y.Text` named `content` for the
//! body and a `Y.Map` named `meta` holding the title. Every edit made through
//! the handle becomes one change record; commits are records that carry a
//! message and no edit.

use serde::Serialize;
use ts_rs::TS;
use yrs::{
    Doc, GetString, Map, MapRef, Out, ReadTxn, Text, TextRef, Transact, Update,
    updates::decoder::Decode,
};

use super::change_log::{ChangeLog, ChangeRecord};
use crate::error::{RepositoryError, StoreResult};
use crate::ids::{DocumentId, Heads};

/// Name of the Y.Text holding the document body.
const CONTENT_TEXT_NAME: &str = "content";

/// Name of the Y.Map holding scalar document fields.
const META_MAP_NAME: &str = "meta";

const TITLE_KEY: &str = "title";

/// A point-in-time read of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DocumentSnapshot {
    /// Document id
    #[ts(type = "string")]
    pub id: DocumentId,
    /// Title
    pub title: String,
    /// Text content
    pub content: String,
    /// Heads of the state this snapshot was read at
    #[ts(type = "Array<string>")]
    pub heads: Heads,
}

/// The fields of a document at some state, without identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentView {
    /// Title
    pub title: String,
    /// Text content
    pub content: String,
}

/// One structural difference between two document states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "action", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum Patch {
    /// A scalar field was set.
    Put {
        /// Field name
        field: String,
        /// New value
        value: String,
    },
    /// A range of the text body was replaced. Offsets count characters.
    Splice {
        /// Field name
        field: String,
        /// Start of the replaced range
        index: usize,
        /// Number of characters removed
        delete: usize,
        /// Inserted text
        insert: String,
    },
}

/// Common prefix and suffix lengths, in chars, of `old` and `new`.
fn common_affixes(old: &[char], new: &[char]) -> (usize, usize) {
    let prefix = old.iter().zip(new.iter()).take_while(|(a, b)| a == b).count();
    let max_suffix = (old.len() - prefix).min(new.len() - prefix);
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .take(max_suffix)
        .count();
    (prefix, suffix)
}

/// Compute the patches turning `from` into `to`.
pub fn diff_views(from: &DocumentView, to: &DocumentView) -> Vec<Patch> {
    let mut patches = Vec::new();
    if from.title != to.title {
        patches.push(Patch::Put {
            field: TITLE_KEY.to_string(),
            value: to.title.clone(),
        });
    }
    if from.content != to.content {
        let old: Vec<char> = from.content.chars().collect();
        let new: Vec<char> = to.content.chars().collect();
        let (prefix, suffix) = common_affixes(&old, &new);
        patches.push(Patch::Splice {
            field: CONTENT_TEXT_NAME.to_string(),
            index: prefix,
            delete: old.len() - prefix - suffix,
            insert: new[prefix..new.len() - suffix].iter().collect(),
        });
    }
    patches
}

fn apply_updates<'a>(doc: &Doc, updates: impl IntoIterator<Item = &'a [u8]>) -> StoreResult<()> {
    let mut txn = doc.transact_mut();
    for bytes in updates {
        let update = Update::decode_v1(bytes)
            .map_err(|e| RepositoryError::new(format!("corrupt document update: {e}")))?;
        txn.apply_update(update)
            .map_err(|e| RepositoryError::new(format!("failed to apply document update: {e}")))?;
    }
    Ok(())
}

fn read_view(doc: &Doc, content: &TextRef, meta: &MapRef) -> DocumentView {
    let txn = doc.transact();
    let title = match meta.get(&txn, TITLE_KEY) {
        Some(Out::Any(yrs::Any::String(s))) => s.to_string(),
        _ => String::new(),
    };
    DocumentView {
        title,
        content: content.get_string(&txn),
    }
}

/// A loaded versioned document.
#[derive(Debug)]
pub struct DocumentHandle {
    id: DocumentId,
    log: ChangeLog,
    doc: Doc,
    content: TextRef,
    meta: MapRef,
}

impl DocumentHandle {
    /// A document with no changes yet.
    pub fn new(id: DocumentId) -> Self {
        let doc = Doc::new();
        let content = doc.get_or_insert_text(CONTENT_TEXT_NAME);
        let meta = doc.get_or_insert_map(META_MAP_NAME);
        Self {
            id,
            log: ChangeLog::new(),
            doc,
            content,
            meta,
        }
    }

    /// Start a document whose first change sets its initial fields.
    ///
    /// The first record is produced even when both fields are empty, so the
    /// document exists once that record is saved.
    pub fn create(id: DocumentId, title: &str, content: &str) -> (Self, ChangeRecord) {
        let mut handle = Self::new(id);
        let record = match handle.edit(Some(title), Some(content)) {
            Some(record) => record,
            None => handle.log.append(None, Vec::new()),
        };
        (handle, record)
    }

    /// Materialise a document from its change log.
    pub fn from_log(id: DocumentId, log: ChangeLog) -> StoreResult<Self> {
        let doc = Doc::new();
        let content = doc.get_or_insert_text(CONTENT_TEXT_NAME);
        let meta = doc.get_or_insert_map(META_MAP_NAME);
        apply_updates(&doc, log.updates_for(log.heads())?)?;
        Ok(Self {
            id,
            log,
            doc,
            content,
            meta,
        })
    }

    /// The document id.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The change log.
    pub fn change_log(&self) -> &ChangeLog {
        &self.log
    }

    /// Current heads.
    pub fn heads(&self) -> &Heads {
        self.log.heads()
    }

    /// Current fields.
    pub fn view(&self) -> DocumentView {
        read_view(&self.doc, &self.content, &self.meta)
    }

    /// Current title.
    pub fn title(&self) -> String {
        self.view().title
    }

    /// Current text content.
    pub fn content(&self) -> String {
        let txn = self.doc.transact();
        self.content.get_string(&txn)
    }

    /// Read the current state.
    pub fn snapshot(&self) -> DocumentSnapshot {
        let view = self.view();
        DocumentSnapshot {
            id: self.id,
            title: view.title,
            content: view.content,
            heads: self.heads().clone(),
        }
    }

    /// Materialise the fields at any historical state.
    ///
    /// An empty set of heads is the empty document. Unknown heads fail with
    /// `NotFound`.
    pub fn view_at(&self, heads: &Heads) -> StoreResult<DocumentView> {
        if heads == self.heads() {
            return Ok(self.view());
        }
        let doc = Doc::new();
        let content = doc.get_or_insert_text(CONTENT_TEXT_NAME);
        let meta = doc.get_or_insert_map(META_MAP_NAME);
        apply_updates(&doc, self.log.updates_for(heads)?)?;
        Ok(read_view(&doc, &content, &meta))
    }

    /// Set title and content together as one change.
    ///
    /// Returns the new record, or `None` if nothing changed.
    pub fn edit(&mut self, title: Option<&str>, content: Option<&str>) -> Option<ChangeRecord> {
        let current = self.view();
        let title = title.filter(|t| *t != current.title);
        let content = content.filter(|c| *c != current.content);
        if title.is_none() && content.is_none() {
            return None;
        }

        let sv_before = self.doc.transact().state_vector();
        {
            let mut txn = self.doc.transact_mut();
            if let Some(title) = title {
                self.meta.insert(&mut txn, TITLE_KEY, title);
            }
            if let Some(content) = content {
                splice_text(&self.content, &mut txn, &current.content, content);
            }
        }
        let update = self.doc.transact().encode_state_as_update_v1(&sv_before);
        Some(self.log.append(None, update))
    }

    /// Replace the text content with a minimal splice.
    pub fn set_content(&mut self, content: &str) -> Option<ChangeRecord> {
        self.edit(None, Some(content))
    }

    /// Record a commit on top of the current heads.
    pub fn commit(&mut self, message: &str) -> ChangeRecord {
        self.log.append(Some(message.to_string()), Vec::new())
    }
}

/// Apply the minimal prefix/suffix splice turning `current` into `new`.
///
/// yrs text offsets are UTF-8 byte offsets, so char positions are converted
/// at char boundaries.
fn splice_text(text: &TextRef, txn: &mut yrs::TransactionMut<'_>, current: &str, new: &str) {
    let old_chars: Vec<char> = current.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    let (prefix, suffix) = common_affixes(&old_chars, &new_chars);

    let start: usize = old_chars[..prefix].iter().map(|c| c.len_utf8()).sum();
    let delete_len: usize = old_chars[prefix..old_chars.len() - suffix]
        .iter()
        .map(|c| c.len_utf8())
        .sum();
    let insert: String = new_chars[prefix..new_chars.len() - suffix].iter().collect();

    if delete_len > 0 {
        text.remove_range(txn, start as u32, delete_len as u32);
    }
    if !insert.is_empty() {
        text.insert(txn, start as u32, &insert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_and_reload_from_log() {
        let id = DocumentId::new();
        let mut handle = DocumentHandle::new(id);
        assert!(handle.edit(Some("notes.txt"), Some("hello world")).is_some());
        assert!(handle.set_content("hello brave world").is_some());

        let reloaded = DocumentHandle::from_log(id, handle.change_log().clone()).unwrap();
        assert_eq!(reloaded.title(), "notes.txt");
        assert_eq!(reloaded.content(), "hello brave world");
        assert_eq!(reloaded.heads(), handle.heads());
    }

    #[test]
    fn test_create_empty_document_has_a_record() {
        let (handle, record) = DocumentHandle::create(DocumentId::new(), "", "");
        assert_eq!(handle.change_log().len(), 1);
        assert!(record.update.is_empty());
        assert!(record.message.is_none());
        assert_eq!(handle.view(), DocumentView::default());
    }

    #[test]
    fn test_noop_edit_records_nothing() {
        let mut handle = DocumentHandle::new(DocumentId::new());
        handle.edit(Some("t"), Some("same")).unwrap();
        assert!(handle.set_content("same").is_none());
        assert!(handle.edit(Some("t"), None).is_none());
        assert_eq!(handle.change_log().len(), 1);
    }

    #[test]
    fn test_splice_handles_multibyte_text() {
        let mut handle = DocumentHandle::new(DocumentId::new());
        handle.set_content("héllo wörld").unwrap();
        handle.set_content("héllo, wörld!").unwrap();
        assert_eq!(handle.content(), "héllo, wörld!");
        handle.set_content("日本").unwrap();
        assert_eq!(handle.content(), "日本");
    }

    #[test]
    fn test_view_at_historical_heads() {
        let mut handle = DocumentHandle::new(DocumentId::new());
        handle.edit(Some("t"), Some("v1")).unwrap();
        let v1_heads = handle.heads().clone();
        handle.set_content("v2").unwrap();

        assert_eq!(handle.view_at(&v1_heads).unwrap().content, "v1");
        assert_eq!(handle.view_at(&Heads::new()).unwrap(), DocumentView::default());
        assert_eq!(handle.view_at(handle.heads()).unwrap().content, "v2");
    }

    #[test]
    fn test_commit_does_not_change_content() {
        let mut handle = DocumentHandle::new(DocumentId::new());
        handle.set_content("text").unwrap();
        let before = handle.heads().clone();
        let record = handle.commit("first");
        assert_ne!(handle.heads(), &before);
        assert!(record.update.is_empty());
        assert_eq!(handle.view_at(handle.heads()).unwrap().content, "text");
        assert_eq!(handle.view_at(&before).unwrap().content, "text");
    }

    #[test]
    fn test_diff_views() {
        let from = DocumentView {
            title: "a".to_string(),
            content: "the cat sat".to_string(),
        };
        let to = DocumentView {
            title: "b".to_string(),
            content: "the dog sat".to_string(),
        };
        assert_eq!(
            diff_views(&from, &to),
            vec![
                Patch::Put {
                    field: "title".to_string(),
                    value: "b".to_string()
                },
                Patch::Splice {
                    field: "content".to_string(),
                    index: 4,
                    delete: 3,
                    insert: "dog".to_string()
                },
            ]
        );
        assert!(diff_views(&to, &to).is_empty());
    }
}
