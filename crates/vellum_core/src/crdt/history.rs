//! Commit history derived from a document's change log.
//!
//! A document's timeline is a list of [`Change`]s. Changes carrying a commit
//! message are commits; the live tip after the last commit, if it differs in
//! content, is shown as one uncommitted change.
//!
//! # Example
//!
//! ```ignore
//! use vellum_core::crdt::{get_history, get_diff_from_previous_commit};
//!
//! let history = get_history(&handle)?;
//! for change in &history.history {
//!     let patches = get_diff_from_previous_commit(&handle, change)?;
//!     println!("{:?}: {} patches", change.message(), patches.len());
//! }
//! ```

use serde::Serialize;
use ts_rs::TS;

use super::change_log::ChangeEntry;
use super::document::{DocumentHandle, DocumentSnapshot, DocumentView, Patch, diff_views};
use crate::error::{NotFoundError, StoreResult};
use crate::ids::{CommitId, Heads};

/// A point in a document's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum Change {
    /// A committed change.
    Commit {
        /// Heads right after the commit
        #[ts(type = "Array<string> | string")]
        id: CommitId,
        /// Unix timestamp in milliseconds
        time: i64,
        /// Commit message, never empty
        message: String,
    },
    /// The live tip, not yet committed.
    Uncommitted {
        /// Heads of the tip
        #[ts(type = "Array<string> | string")]
        id: CommitId,
        /// Unix timestamp in milliseconds
        time: i64,
    },
}

impl Change {
    /// Build from raw change metadata.
    ///
    /// A missing or empty message means the change is uncommitted.
    pub fn from_raw(heads: Heads, time: i64, message: Option<&str>) -> Self {
        let id = CommitId::Heads(heads);
        match message {
            Some(message) if !message.is_empty() => Change::Commit {
                id,
                time,
                message: message.to_string(),
            },
            _ => Change::Uncommitted { id, time },
        }
    }

    fn from_entry(entry: &ChangeEntry) -> Self {
        Self::from_raw(entry.heads.clone(), entry.time, entry.message.as_deref())
    }

    /// The commit id.
    pub fn id(&self) -> &CommitId {
        match self {
            Change::Commit { id, .. } => id,
            Change::Uncommitted { id, .. } => id,
        }
    }

    /// Unix timestamp in milliseconds.
    pub fn time(&self) -> i64 {
        match self {
            Change::Commit { time, .. } => *time,
            Change::Uncommitted { time, .. } => *time,
        }
    }

    /// The commit message, if committed.
    pub fn message(&self) -> Option<&str> {
        match self {
            Change::Commit { message, .. } => Some(message),
            Change::Uncommitted { .. } => None,
        }
    }

    /// Whether this is a commit.
    pub fn is_commit(&self) -> bool {
        matches!(self, Change::Commit { .. })
    }

    fn heads(&self) -> Option<&Heads> {
        self.id().as_heads()
    }
}

/// A document's derived history.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DocumentHistory {
    /// Commits newest first, preceded by the uncommitted tip when there is one
    pub history: Vec<Change>,
    /// The current document state
    pub current: DocumentSnapshot,
    /// The most recent change, committed or not
    pub latest_change: Option<Change>,
    /// The most recent commit
    pub last_commit: Option<Change>,
}

fn view_of(handle: &DocumentHandle, change: &Change) -> StoreResult<DocumentView> {
    match change.heads() {
        Some(heads) => handle.view_at(heads),
        None => Err(NotFoundError::new(format!(
            "change {:?} is not part of this document's history",
            change.id()
        ))
        .into()),
    }
}

/// Derive the history of a document.
///
/// The latest change is left out when it is uncommitted and either shares its
/// heads with the newest commit or has the same content.
pub fn get_history(handle: &DocumentHandle) -> StoreResult<DocumentHistory> {
    let entries = handle.change_log().entries();
    let latest_change = entries.last().map(Change::from_entry);

    let commits: Vec<Change> = entries
        .iter()
        .rev()
        .map(Change::from_entry)
        .filter(Change::is_commit)
        .collect();
    let last_commit = commits.first().cloned();

    let show_latest = match (&latest_change, &last_commit) {
        (None, _) => false,
        (Some(latest), _) if latest.is_commit() => false,
        (Some(_), None) => true,
        (Some(latest), Some(top)) => {
            if latest.id() == top.id() {
                false
            } else {
                let patches = diff_views(&view_of(handle, top)?, &view_of(handle, latest)?);
                !patches.is_empty()
            }
        }
    };

    let mut history = Vec::with_capacity(commits.len() + 1);
    if show_latest && let Some(latest) = &latest_change {
        history.push(latest.clone());
    }
    history.extend(commits);

    Ok(DocumentHistory {
        history,
        current: handle.snapshot(),
        latest_change,
        last_commit,
    })
}

/// Patches from the entry before `change` in the derived history to `change`.
///
/// The oldest entry is diffed against the empty document. A change that is
/// not in the history is [`NotFoundError`].
pub fn get_diff_from_previous_commit(
    handle: &DocumentHandle,
    change: &Change,
) -> StoreResult<Vec<Patch>> {
    let history = get_history(handle)?.history;
    let position = history
        .iter()
        .position(|c| c.id() == change.id())
        .ok_or_else(|| {
            NotFoundError::new(format!(
                "change {:?} is not part of this document's history",
                change.id()
            ))
        })?;

    let before = match history.get(position + 1) {
        Some(previous) => view_of(handle, previous)?,
        None => DocumentView::default(),
    };
    let after = view_of(handle, &history[position])?;
    Ok(diff_views(&before, &after))
}

/// Whether the document has content that is not in its newest commit.
pub fn has_uncommitted_changes(handle: &DocumentHandle) -> StoreResult<bool> {
    let history = get_history(handle)?;
    Ok(history.history.first().is_some_and(|c| !c.is_commit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DocumentId;

    fn handle_with(content: &str) -> DocumentHandle {
        let mut handle = DocumentHandle::new(DocumentId::new());
        handle.edit(Some("doc"), Some(content)).unwrap();
        handle
    }

    #[test]
    fn test_from_raw_treats_empty_message_as_uncommitted() {
        assert!(!Change::from_raw(Heads::new(), 0, None).is_commit());
        assert!(!Change::from_raw(Heads::new(), 0, Some("")).is_commit());
        assert!(Change::from_raw(Heads::new(), 0, Some("msg")).is_commit());
    }

    #[test]
    fn test_only_uncommitted_changes() {
        let handle = handle_with("draft");
        let history = get_history(&handle).unwrap();
        assert_eq!(history.history.len(), 1);
        assert!(!history.history[0].is_commit());
        assert!(history.last_commit.is_none());
        assert!(has_uncommitted_changes(&handle).unwrap());
    }

    #[test]
    fn test_commits_newest_first_with_uncommitted_tip() {
        let mut handle = handle_with("one");
        handle.commit("first");
        handle.set_content("two").unwrap();
        handle.commit("second");
        handle.set_content("three").unwrap();

        let history = get_history(&handle).unwrap();
        let messages: Vec<_> = history.history.iter().map(Change::message).collect();
        assert_eq!(messages, vec![None, Some("second"), Some("first")]);
        assert_eq!(history.last_commit.unwrap().message(), Some("second"));
        assert_eq!(history.current.content, "three");
    }

    #[test]
    fn test_latest_commit_is_not_duplicated() {
        let mut handle = handle_with("one");
        handle.commit("first");
        let history = get_history(&handle).unwrap();
        assert_eq!(history.history.len(), 1);
        assert!(!has_uncommitted_changes(&handle).unwrap());
    }

    #[test]
    fn test_content_equal_tip_collapses_into_commit() {
        let mut handle = handle_with("stable");
        handle.commit("first");
        handle.set_content("temporary").unwrap();
        handle.set_content("stable").unwrap();

        let history = get_history(&handle).unwrap();
        assert_ne!(
            history.latest_change.as_ref().unwrap().id(),
            history.last_commit.as_ref().unwrap().id()
        );
        assert_eq!(history.history.len(), 1);
        assert!(history.history[0].is_commit());
        assert!(!has_uncommitted_changes(&handle).unwrap());
    }

    #[test]
    fn test_diff_from_previous_commit() {
        let mut handle = handle_with("alpha");
        handle.commit("first");
        handle.set_content("alpha beta").unwrap();
        handle.commit("second");

        let history = get_history(&handle).unwrap().history;
        let diff = get_diff_from_previous_commit(&handle, &history[0]).unwrap();
        assert_eq!(
            diff,
            vec![Patch::Splice {
                field: "content".to_string(),
                index: 5,
                delete: 0,
                insert: " beta".to_string(),
            }]
        );

        let oldest = get_diff_from_previous_commit(&handle, &history[1]).unwrap();
        assert_eq!(oldest.len(), 2);
    }

    #[test]
    fn test_diff_for_unknown_change_is_not_found() {
        let handle = handle_with("x");
        let stranger = Change::from_raw(Heads::new(), 0, Some("elsewhere"));
        assert!(matches!(
            get_diff_from_previous_commit(&handle, &stranger),
            Err(crate::error::StoreError::NotFound(_))
        ));
    }
}
