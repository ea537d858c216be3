//! CRDT-backed versioned documents.
//!
//! Documents are yrs docs whose every edit is recorded in a content-addressed
//! [`ChangeLog`]. History, historical views and diffs are derived from that
//! log. Persistence goes through the [`CrdtStorage`] key/value trait, with a
//! SQLite implementation for native builds and an in-memory one for tests.

mod change_log;
mod document;
mod history;
mod memory_storage;
#[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
mod sqlite_storage;
mod storage;

pub use change_log::{CHANGE_FORMAT_VERSION, ChangeEntry, ChangeLog, ChangeRecord};
pub(crate) use change_log::DOCUMENTS_KEY;
pub use document::{DocumentHandle, DocumentSnapshot, DocumentView, Patch, diff_views};
pub use history::{
    Change, DocumentHistory, get_diff_from_previous_commit, get_history, has_uncommitted_changes,
};
pub use memory_storage::MemoryStorage;
#[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
pub(crate) use sqlite_storage::escape_glob;
#[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
pub use sqlite_storage::{
    SCHEMA_VERSION, SqliteStorage, VERSION_CONTROL_SYSTEM, validate_table_name,
};
pub use storage::{
    CrdtStorage, DEFAULT_TABLE, KEY_SEPARATOR, StorageEntry, join_key, join_prefix, split_key,
};
