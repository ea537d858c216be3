//! Versioned document store.
//!
//! [`VersionedDocumentStore`] is the port the reconciler and front ends talk
//! to. [`CrdtDocumentStore`] implements it over a [`CrdtStorage`]: each
//! document is a change log under `documents/<uuid>/changes/`, materialised
//! into a [`DocumentHandle`] on demand.

use std::sync::{Arc, Mutex};

use super::recent::RecentDocuments;
use super::types::{CreateDocumentArgs, RecentDocument, Representation, UpdateContentArgs};
use crate::crdt::{
    ChangeLog, CrdtStorage, DOCUMENTS_KEY, DocumentHandle, DocumentSnapshot,
    has_uncommitted_changes,
};
use crate::error::{NotFoundError, StoreResult, ValidationError};
use crate::fs::BoxFuture;
use crate::ids::{ChangeHash, DocumentId};

/// Converts content from an incoming representation into stored text.
pub trait RepresentationTransform: Send + Sync {
    /// Convert `content` in `representation` into the text to store.
    fn to_stored_text(&self, representation: Representation, content: &str)
    -> StoreResult<String>;
}

/// Stores content exactly as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransform;

impl RepresentationTransform for PassthroughTransform {
    fn to_stored_text(
        &self,
        _representation: Representation,
        content: &str,
    ) -> StoreResult<String> {
        Ok(content.to_string())
    }
}

/// Port for CRUD, content and commit operations on versioned documents.
///
/// # Example
///
/// ```ignore
/// let id = store
///     .create_document(CreateDocumentArgs { title: "notes.md".into(), content: "hi".into() })
///     .await?;
/// store.commit_changes(id, "Initial import").await?;
/// ```
pub trait VersionedDocumentStore: Send + Sync {
    /// Create a document and return its id.
    fn create_document<'a>(
        &'a self,
        args: CreateDocumentArgs,
    ) -> BoxFuture<'a, StoreResult<DocumentId>>;

    /// Load a document. Missing documents are `NotFound`.
    fn find_document_handle_by_id<'a>(
        &'a self,
        id: DocumentId,
    ) -> BoxFuture<'a, StoreResult<DocumentHandle>>;

    /// Read the current state of a loaded document.
    fn get_document_from_handle<'a>(
        &'a self,
        handle: &'a DocumentHandle,
    ) -> BoxFuture<'a, StoreResult<DocumentSnapshot>>;

    /// Replace a document's text content.
    ///
    /// Returns whether anything changed.
    fn update_rich_text_document_content<'a>(
        &'a self,
        args: UpdateContentArgs,
    ) -> BoxFuture<'a, StoreResult<bool>>;

    /// Delete a document and all of its history. Missing documents are
    /// `NotFound`.
    fn delete_document<'a>(&'a self, id: DocumentId) -> BoxFuture<'a, StoreResult<()>>;

    /// Commit the document's uncommitted changes with `message`.
    ///
    /// Returns the hash of the commit, or `None` when there was nothing to
    /// commit. Blank messages are `Validation` errors.
    fn commit_changes<'a>(
        &'a self,
        id: DocumentId,
        message: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ChangeHash>>>;

    /// Up to `limit` recently changed documents, newest first.
    fn list_recent_documents<'a>(
        &'a self,
        limit: usize,
    ) -> BoxFuture<'a, StoreResult<Vec<RecentDocument>>>;
}

/// [`VersionedDocumentStore`] over a [`CrdtStorage`] backend.
pub struct CrdtDocumentStore {
    storage: Arc<dyn CrdtStorage>,
    transform: Arc<dyn RepresentationTransform>,
    recent: RecentDocuments,
    /// Serialises load-modify-save of change logs.
    write_lock: Mutex<()>,
}

impl CrdtDocumentStore {
    /// Store content as given.
    pub fn new(storage: Arc<dyn CrdtStorage>) -> Self {
        Self::with_transform(storage, Arc::new(PassthroughTransform))
    }

    /// Store content converted by `transform`.
    pub fn with_transform(
        storage: Arc<dyn CrdtStorage>,
        transform: Arc<dyn RepresentationTransform>,
    ) -> Self {
        Self {
            recent: RecentDocuments::new(Arc::clone(&storage)),
            storage,
            transform,
            write_lock: Mutex::new(()),
        }
    }

    /// The recent-documents index.
    pub fn recent(&self) -> &RecentDocuments {
        &self.recent
    }

    fn load(&self, id: DocumentId) -> StoreResult<DocumentHandle> {
        let log = ChangeLog::load(self.storage.as_ref(), id)?;
        DocumentHandle::from_log(id, log)
    }

    fn create(&self, args: CreateDocumentArgs) -> StoreResult<DocumentId> {
        let id = DocumentId::new();
        let (_, record) = DocumentHandle::create(id, &args.title, &args.content);
        ChangeLog::save_record(self.storage.as_ref(), id, &record)?;
        self.recent.record(id, &args.title)?;
        log::debug!("Created document {id} ({})", args.title);
        Ok(id)
    }

    fn update_content(&self, args: UpdateContentArgs) -> StoreResult<bool> {
        let text = self
            .transform
            .to_stored_text(args.representation, &args.content)?;

        let _guard = self.write_lock.lock().unwrap();
        let mut handle = self.load(args.document_id)?;
        match handle.set_content(&text) {
            Some(record) => {
                ChangeLog::save_record(self.storage.as_ref(), args.document_id, &record)?;
                self.recent.record(args.document_id, &handle.title())?;
                log::debug!("Updated content of document {}", args.document_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: DocumentId) -> StoreResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let key = id.key();
        let prefix = [DOCUMENTS_KEY, key.as_str()];
        if self.storage.load_range(&prefix)?.is_empty() {
            return Err(NotFoundError::new(format!("document {id} not found")).into());
        }
        self.storage.remove_range(&prefix)?;
        self.recent.remove(id)?;
        log::debug!("Deleted document {id}");
        Ok(())
    }

    fn commit(&self, id: DocumentId, message: &str) -> StoreResult<Option<ChangeHash>> {
        if message.trim().is_empty() {
            return Err(ValidationError::new("commit message must not be empty").into());
        }

        let _guard = self.write_lock.lock().unwrap();
        let mut handle = self.load(id)?;
        if !has_uncommitted_changes(&handle)? {
            return Ok(None);
        }
        let record = handle.commit(message);
        ChangeLog::save_record(self.storage.as_ref(), id, &record)?;
        self.recent.record(id, &handle.title())?;
        log::debug!("Committed document {id}: {message}");
        Ok(Some(record.hash))
    }
}

impl VersionedDocumentStore for CrdtDocumentStore {
    fn create_document<'a>(
        &'a self,
        args: CreateDocumentArgs,
    ) -> BoxFuture<'a, StoreResult<DocumentId>> {
        Box::pin(async move { self.create(args) })
    }

    fn find_document_handle_by_id<'a>(
        &'a self,
        id: DocumentId,
    ) -> BoxFuture<'a, StoreResult<DocumentHandle>> {
        Box::pin(async move { self.load(id) })
    }

    fn get_document_from_handle<'a>(
        &'a self,
        handle: &'a DocumentHandle,
    ) -> BoxFuture<'a, StoreResult<DocumentSnapshot>> {
        Box::pin(async move { Ok(handle.snapshot()) })
    }

    fn update_rich_text_document_content<'a>(
        &'a self,
        args: UpdateContentArgs,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move { self.update_content(args) })
    }

    fn delete_document<'a>(&'a self, id: DocumentId) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.delete(id) })
    }

    fn commit_changes<'a>(
        &'a self,
        id: DocumentId,
        message: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ChangeHash>>> {
        Box::pin(async move { self.commit(id, message) })
    }

    fn list_recent_documents<'a>(
        &'a self,
        limit: usize,
    ) -> BoxFuture<'a, StoreResult<Vec<RecentDocument>>> {
        Box::pin(async move { self.recent.list(limit) })
    }
}
