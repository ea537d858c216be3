//! Shared fixtures for unit tests.

use std::future::Future;
use std::sync::Arc;

use crate::crdt::{CrdtStorage, MemoryStorage};
use crate::fs::{AsyncFileSystem, InMemoryFileSystem, SyncToAsyncFs};
use crate::reconcile::ProjectReconciler;
use crate::store::{CrdtDocumentStore, CrdtProjectStore};

/// Drive a future to completion on the current thread.
pub fn block_on<F: Future>(future: F) -> F::Output {
    futures_lite::future::block_on(future)
}

/// A reconciler over in-memory storage and an in-memory filesystem.
pub struct Fixture {
    /// Files the reconciler reads
    pub fs: InMemoryFileSystem,
    /// Document store
    pub documents: Arc<CrdtDocumentStore>,
    /// Project store
    pub projects: Arc<CrdtProjectStore>,
    /// Reconciler wired to the above
    pub reconciler: ProjectReconciler,
}

impl Fixture {
    /// Wire everything around `fs`.
    pub fn new(fs: InMemoryFileSystem) -> Self {
        let storage: Arc<dyn CrdtStorage> = Arc::new(MemoryStorage::new());
        let documents = Arc::new(CrdtDocumentStore::new(Arc::clone(&storage)));
        let projects = Arc::new(CrdtProjectStore::new(storage));
        let async_fs: Arc<dyn AsyncFileSystem> = Arc::new(SyncToAsyncFs::new(fs.clone()));
        let reconciler = ProjectReconciler::new(async_fs, documents.clone(), projects.clone());
        Self {
            fs,
            documents,
            projects,
            reconciler,
        }
    }
}
