//! Keeps a project in agreement with the directory it was created from.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use futures_util::future;
use indexmap::IndexMap;
use serde::Serialize;
use ts_rs::TS;

use super::concurrency::{AbortHandle, MAX_CONCURRENT_OPERATIONS, try_map_bounded};
use crate::config::Config;
use crate::conflict::{PathChange, StructuralConflict, content_hash, detect_structural_conflicts};
use crate::crdt::has_uncommitted_changes;
use crate::error::{ReconcileError, ReconcileResult, StoreError};
use crate::fs::{AsyncFileSystem, File, list_directory_files};
use crate::ids::{DocumentId, ResolvedArtifactId};
use crate::store::{
    ArtifactMetaData, CreateDocumentArgs, CreateProjectArgs, MultiDocumentProjectStore, ProjectId,
    Representation, UpdateContentArgs, VersionedDocumentStore,
};

/// Extensions treated as project documents when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "txt"];

/// What a reconciliation run changed, by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ReconcileReport {
    /// Files imported as new documents
    pub created: Vec<String>,
    /// Documents whose content was replaced from their file
    pub updated: Vec<String>,
    /// Documents deleted because their file is gone
    pub deleted: Vec<String>,
    /// Paths left alone because both sides changed
    pub conflicts: Vec<StructuralConflict>,
}

impl ReconcileReport {
    /// Whether the run changed nothing and found no conflicts.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.conflicts.is_empty()
    }
}

enum FileAction<'a> {
    Create(File),
    Update(&'a ArtifactMetaData, File),
}

enum FileOutcome {
    Created(String),
    Updated(String),
    Unchanged,
}

enum RemovalOutcome {
    Deleted(String),
    Conflict(StructuralConflict),
}

/// Reconciles directories with projects in the document store.
///
/// The directory is authoritative: files are imported or pushed into their
/// documents, never the reverse. Documents whose file disappeared are
/// deleted unless they carry uncommitted changes, which is reported as a
/// modify/delete conflict instead.
pub struct ProjectReconciler {
    fs: Arc<dyn AsyncFileSystem>,
    documents: Arc<dyn VersionedDocumentStore>,
    projects: Arc<dyn MultiDocumentProjectStore>,
    extensions: Vec<String>,
    max_concurrent_operations: usize,
    abort: Option<AbortHandle>,
}

impl ProjectReconciler {
    /// A reconciler with the default extensions and concurrency cap.
    pub fn new(
        fs: Arc<dyn AsyncFileSystem>,
        documents: Arc<dyn VersionedDocumentStore>,
        projects: Arc<dyn MultiDocumentProjectStore>,
    ) -> Self {
        Self {
            fs,
            documents,
            projects,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_concurrent_operations: MAX_CONCURRENT_OPERATIONS,
            abort: None,
        }
    }

    /// Only files with these extensions are project documents.
    pub fn with_extensions<S: Into<String>>(
        mut self,
        extensions: impl IntoIterator<Item = S>,
    ) -> Self {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Cap on concurrently running operations per batch.
    pub fn with_max_concurrent_operations(mut self, limit: usize) -> Self {
        self.max_concurrent_operations = limit.max(1);
        self
    }

    /// Stop scheduling work once `handle` is aborted.
    pub fn with_abort_handle(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    /// Apply the reconciliation settings of `config`.
    pub fn with_config(self, config: &Config) -> Self {
        self.with_extensions(config.extensions.iter().cloned())
            .with_max_concurrent_operations(config.max_concurrent_operations)
    }

    /// Import every recognised file under `directory` into a new project.
    ///
    /// Each file becomes a committed document titled with its file name. Any
    /// failure fails the whole operation; documents created before it are
    /// kept.
    pub async fn create_project_from_filesystem_content(
        &self,
        directory: &Path,
    ) -> ReconcileResult<ProjectId> {
        let files = list_directory_files(self.fs.as_ref(), directory, &self.extensions).await?;

        let mut artifacts = try_map_bounded(
            files,
            self.max_concurrent_operations,
            self.abort.as_ref(),
            |file| self.import_file(file),
        )
        .await?;
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));

        let count = artifacts.len();
        let documents: IndexMap<ResolvedArtifactId, ArtifactMetaData> =
            artifacts.into_iter().map(|a| (a.id.clone(), a)).collect();
        let project_id = self
            .projects
            .create_project(CreateProjectArgs {
                path: directory.to_string_lossy().into_owned(),
                documents,
            })
            .await?;

        log::info!(
            "Created project {project_id} from {} with {count} documents",
            directory.display()
        );
        Ok(project_id)
    }

    /// Bring an existing project in line with `directory`.
    ///
    /// Files are matched to project documents by name and path. New files are
    /// imported, changed files are pushed into their documents and documents
    /// without a file are deleted. Running it again without touching the
    /// directory changes nothing.
    pub async fn update_project_from_filesystem_content(
        &self,
        project_id: ProjectId,
        directory: &Path,
    ) -> ReconcileResult<ReconcileReport> {
        let (artifacts, files) = future::try_join(
            async {
                self.projects
                    .list_project_documents(project_id)
                    .await
                    .map_err(ReconcileError::from)
            },
            async {
                list_directory_files(self.fs.as_ref(), directory, &self.extensions)
                    .await
                    .map_err(ReconcileError::from)
            },
        )
        .await?;

        let by_location: HashMap<(&str, &str), &ArtifactMetaData> = artifacts
            .iter()
            .map(|a| ((a.name.as_str(), a.path.as_str()), a))
            .collect();
        let file_locations: HashSet<(&str, &str)> = files
            .iter()
            .map(|f| (f.name.as_str(), f.path.as_str()))
            .collect();
        let stale: Vec<&ArtifactMetaData> = artifacts
            .iter()
            .filter(|a| !file_locations.contains(&(a.name.as_str(), a.path.as_str())))
            .collect();

        let actions: Vec<FileAction<'_>> = files
            .iter()
            .map(|file| match by_location.get(&(file.name.as_str(), file.path.as_str())) {
                Some(artifact) => FileAction::Update(*artifact, file.clone()),
                None => FileAction::Create(file.clone()),
            })
            .collect();

        log::debug!(
            "Reconciling project {project_id}: {} files, {} documents, {} stale",
            files.len(),
            artifacts.len(),
            stale.len()
        );

        let (file_outcomes, removal_outcomes) = future::try_join(
            try_map_bounded(
                actions,
                self.max_concurrent_operations,
                self.abort.as_ref(),
                |action| self.apply_file_action(project_id, action),
            ),
            try_map_bounded(
                stale,
                self.max_concurrent_operations,
                self.abort.as_ref(),
                |artifact| self.remove_stale(project_id, artifact),
            ),
        )
        .await?;

        let mut report = ReconcileReport::default();
        for outcome in file_outcomes {
            match outcome {
                FileOutcome::Created(path) => report.created.push(path),
                FileOutcome::Updated(path) => report.updated.push(path),
                FileOutcome::Unchanged => {}
            }
        }
        for outcome in removal_outcomes {
            match outcome {
                RemovalOutcome::Deleted(path) => report.deleted.push(path),
                RemovalOutcome::Conflict(conflict) => report.conflicts.push(conflict),
            }
        }
        report.created.sort();
        report.updated.sort();
        report.deleted.sort();
        report.conflicts.sort_by(|a, b| a.path().cmp(b.path()));

        log::info!(
            "Reconciled project {project_id}: {} created, {} updated, {} deleted, {} conflicts",
            report.created.len(),
            report.updated.len(),
            report.deleted.len(),
            report.conflicts.len()
        );
        Ok(report)
    }

    /// Create and commit a document for `file`.
    async fn create_document_for(&self, file: &File) -> ReconcileResult<DocumentId> {
        let id = self
            .documents
            .create_document(CreateDocumentArgs {
                title: file.name.clone(),
                content: file.content.clone(),
            })
            .await?;
        self.documents
            .commit_changes(id, &format!("Import {}", file.path))
            .await?;
        log::debug!("Imported {} as {id}", file.path);
        Ok(id)
    }

    async fn import_file(&self, file: File) -> ReconcileResult<ArtifactMetaData> {
        let id = self.create_document_for(&file).await?;
        Ok(ArtifactMetaData {
            id: id.into(),
            name: file.name,
            path: file.path,
        })
    }

    async fn apply_file_action(
        &self,
        project_id: ProjectId,
        action: FileAction<'_>,
    ) -> ReconcileResult<FileOutcome> {
        match action {
            FileAction::Create(file) => {
                let artifact = self.import_file(file).await?;
                let path = artifact.path.clone();
                self.projects
                    .add_document_to_project(project_id, artifact)
                    .await?;
                Ok(FileOutcome::Created(path))
            }
            FileAction::Update(artifact, file) => self.update_from_file(artifact, file).await,
        }
    }

    /// Push `file` into its document when both have content and they differ.
    async fn update_from_file(
        &self,
        artifact: &ArtifactMetaData,
        file: File,
    ) -> ReconcileResult<FileOutcome> {
        let ResolvedArtifactId::Document(id) = &artifact.id else {
            log::debug!("Skipping {}: content references are read-only", artifact.path);
            return Ok(FileOutcome::Unchanged);
        };
        let id = *id;

        let handle = self.documents.find_document_handle_by_id(id).await?;
        let document = self.documents.get_document_from_handle(&handle).await?;

        if file.content == document.content {
            return Ok(FileOutcome::Unchanged);
        }
        if file.content.is_empty() || document.content.is_empty() {
            log::warn!(
                "Skipping {}: one side is empty, refusing to overwrite",
                file.path
            );
            return Ok(FileOutcome::Unchanged);
        }

        let changed = self
            .documents
            .update_rich_text_document_content(UpdateContentArgs {
                document_id: id,
                representation: Representation::from_file_name(&file.name),
                content: file.content,
            })
            .await?;
        if !changed {
            return Ok(FileOutcome::Unchanged);
        }
        self.documents
            .commit_changes(id, &format!("Update from {}", file.path))
            .await?;
        log::debug!("Updated {id} from {}", file.path);
        Ok(FileOutcome::Updated(file.path))
    }

    /// Delete the document of a file that no longer exists, then detach it.
    async fn remove_stale(
        &self,
        project_id: ProjectId,
        artifact: &ArtifactMetaData,
    ) -> ReconcileResult<RemovalOutcome> {
        if let ResolvedArtifactId::Document(id) = &artifact.id {
            match self.documents.find_document_handle_by_id(*id).await {
                Ok(handle) => {
                    if has_uncommitted_changes(&handle)? {
                        let conflicts = detect_structural_conflicts(
                            &[PathChange::Deleted {
                                path: artifact.path.clone(),
                            }],
                            &[PathChange::Modified {
                                path: artifact.path.clone(),
                                content_hash: content_hash(&handle.content()),
                            }],
                        );
                        if let Some(conflict) = conflicts.into_iter().next() {
                            log::warn!(
                                "Not deleting {}: document {id} has uncommitted changes",
                                artifact.path
                            );
                            return Ok(RemovalOutcome::Conflict(conflict));
                        }
                    }
                    self.documents.delete_document(*id).await?;
                }
                Err(StoreError::NotFound(_)) => {
                    log::warn!(
                        "Document {id} for {} is already gone, detaching only",
                        artifact.path
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.projects
            .delete_document_from_project(project_id, &artifact.id)
            .await?;
        log::debug!("Removed {} from project {project_id}", artifact.path);
        Ok(RemovalOutcome::Deleted(artifact.path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::crdt::{DocumentHandle, DocumentSnapshot, MemoryStorage, get_history};
    use crate::error::{Classified, ErrorKind, StoreResult};
    use crate::fs::{BoxFuture, FileSystem, InMemoryFileSystem, SyncToAsyncFs};
    use crate::ids::ChangeHash;
    use crate::store::{CrdtDocumentStore, CrdtProjectStore, RecentDocument};
    use crate::test_utils::{Fixture, block_on};

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        Fixture::new(InMemoryFileSystem::with_files(files.iter().copied()))
    }

    fn documents(fixture: &Fixture, project_id: ProjectId) -> Vec<ArtifactMetaData> {
        block_on(fixture.projects.list_project_documents(project_id)).unwrap()
    }

    fn content_of(fixture: &Fixture, artifact: &ArtifactMetaData) -> String {
        let id = artifact.id.document_id().unwrap();
        block_on(fixture.documents.find_document_handle_by_id(id))
            .unwrap()
            .content()
    }

    #[test]
    fn test_create_project_imports_recognised_files() {
        let fixture = fixture(&[
            ("proj/a.md", "alpha"),
            ("proj/notes/b.txt", "beta"),
            ("proj/image.png", "not a document"),
        ]);
        let project_id =
            block_on(fixture.reconciler.create_project_from_filesystem_content(Path::new("proj")))
                .unwrap();

        let listed = documents(&fixture, project_id);
        let paths: Vec<_> = listed.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "notes/b.txt"]);
        assert_eq!(listed[1].name, "b.txt");
        assert_eq!(content_of(&fixture, &listed[0]), "alpha");

        let handle = block_on(
            fixture
                .documents
                .find_document_handle_by_id(listed[0].id.document_id().unwrap()),
        )
        .unwrap();
        assert_eq!(handle.title(), "a.md");
        assert!(!has_uncommitted_changes(&handle).unwrap());
    }

    #[test]
    fn test_create_project_missing_directory_fails() {
        let fixture = fixture(&[]);
        let err = block_on(
            fixture
                .reconciler
                .create_project_from_filesystem_content(Path::new("missing")),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_update_pushes_file_content_and_imports_new_files() {
        let fixture = fixture(&[("proj/a.md", "one")]);
        let project_id =
            block_on(fixture.reconciler.create_project_from_filesystem_content(Path::new("proj")))
                .unwrap();

        fixture.fs.write_file(Path::new("proj/a.md"), "two").unwrap();
        fixture.fs.write_file(Path::new("proj/b.md"), "new").unwrap();

        let report = block_on(
            fixture
                .reconciler
                .update_project_from_filesystem_content(project_id, Path::new("proj")),
        )
        .unwrap();
        assert_eq!(report.updated, vec!["a.md"]);
        assert_eq!(report.created, vec!["b.md"]);
        assert!(report.deleted.is_empty());

        let listed = documents(&fixture, project_id);
        assert_eq!(content_of(&fixture, &listed[0]), "two");
        assert_eq!(content_of(&fixture, &listed[1]), "new");

        let again = block_on(
            fixture
                .reconciler
                .update_project_from_filesystem_content(project_id, Path::new("proj")),
        )
        .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_empty_side_is_never_overwritten() {
        let fixture = fixture(&[("proj/a.md", "keep me")]);
        let project_id =
            block_on(fixture.reconciler.create_project_from_filesystem_content(Path::new("proj")))
                .unwrap();

        fixture.fs.write_file(Path::new("proj/a.md"), "").unwrap();
        let report = block_on(
            fixture
                .reconciler
                .update_project_from_filesystem_content(project_id, Path::new("proj")),
        )
        .unwrap();
        assert!(report.is_empty());
        assert_eq!(
            content_of(&fixture, &documents(&fixture, project_id)[0]),
            "keep me"
        );
    }

    #[test]
    fn test_removed_file_deletes_document() {
        let fixture = fixture(&[("proj/a.md", "a"), ("proj/b.md", "b")]);
        let project_id =
            block_on(fixture.reconciler.create_project_from_filesystem_content(Path::new("proj")))
                .unwrap();
        let b_id = documents(&fixture, project_id)[1].id.document_id().unwrap();

        fixture.fs.delete_file(Path::new("proj/b.md")).unwrap();
        let report = block_on(
            fixture
                .reconciler
                .update_project_from_filesystem_content(project_id, Path::new("proj")),
        )
        .unwrap();

        assert_eq!(report.deleted, vec!["b.md"]);
        assert_eq!(documents(&fixture, project_id).len(), 1);
        assert!(matches!(
            block_on(fixture.documents.find_document_handle_by_id(b_id)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_uncommitted_document_is_not_deleted() {
        let fixture = fixture(&[("proj/a.md", "a")]);
        let project_id =
            block_on(fixture.reconciler.create_project_from_filesystem_content(Path::new("proj")))
                .unwrap();
        let id = documents(&fixture, project_id)[0].id.document_id().unwrap();

        block_on(fixture.documents.update_rich_text_document_content(UpdateContentArgs {
            document_id: id,
            representation: Representation::Markdown,
            content: "edited in the editor".to_string(),
        }))
        .unwrap();
        fixture.fs.delete_file(Path::new("proj/a.md")).unwrap();

        let report = block_on(
            fixture
                .reconciler
                .update_project_from_filesystem_content(project_id, Path::new("proj")),
        )
        .unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(
            report.conflicts,
            vec![StructuralConflict::ModifyDelete {
                path: "a.md".to_string(),
                modified_in: crate::conflict::ConflictSource::Project,
                deleted_in: crate::conflict::ConflictSource::Filesystem,
            }]
        );
        assert_eq!(documents(&fixture, project_id).len(), 1);

        let handle = block_on(fixture.documents.find_document_handle_by_id(id)).unwrap();
        assert_eq!(handle.content(), "edited in the editor");
    }

    #[test]
    fn test_updates_are_committed() {
        let fixture = fixture(&[("proj/a.md", "v1")]);
        let project_id =
            block_on(fixture.reconciler.create_project_from_filesystem_content(Path::new("proj")))
                .unwrap();
        fixture.fs.write_file(Path::new("proj/a.md"), "v2").unwrap();
        block_on(
            fixture
                .reconciler
                .update_project_from_filesystem_content(project_id, Path::new("proj")),
        )
        .unwrap();

        let id = documents(&fixture, project_id)[0].id.document_id().unwrap();
        let handle = block_on(fixture.documents.find_document_handle_by_id(id)).unwrap();
        let messages: Vec<_> = get_history(&handle)
            .unwrap()
            .history
            .iter()
            .map(|c| c.message().map(str::to_string))
            .collect();
        assert_eq!(
            messages,
            vec![
                Some("Update from a.md".to_string()),
                Some("Import a.md".to_string())
            ]
        );
    }

    #[test]
    fn test_aborted_run_fails() {
        let Fixture { reconciler, .. } = fixture(&[("proj/a.md", "a")]);
        let handle = AbortHandle::new();
        let reconciler = reconciler.with_abort_handle(handle.clone());
        handle.abort();

        let err = block_on(reconciler.create_project_from_filesystem_content(Path::new("proj")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Abort);
    }

    /// Counts `create_document` calls in flight. Each call yields once before
    /// reaching the wrapped store so concurrent calls overlap.
    struct InFlightDocuments {
        inner: CrdtDocumentStore,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InFlightDocuments {
        fn new() -> Self {
            Self {
                inner: CrdtDocumentStore::new(Arc::new(MemoryStorage::new())),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl VersionedDocumentStore for InFlightDocuments {
        fn create_document<'a>(
            &'a self,
            args: CreateDocumentArgs,
        ) -> BoxFuture<'a, StoreResult<DocumentId>> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                futures_lite::future::yield_now().await;
                let result = self.inner.create_document(args).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                result
            })
        }

        fn find_document_handle_by_id<'a>(
            &'a self,
            id: DocumentId,
        ) -> BoxFuture<'a, StoreResult<DocumentHandle>> {
            self.inner.find_document_handle_by_id(id)
        }

        fn get_document_from_handle<'a>(
            &'a self,
            handle: &'a DocumentHandle,
        ) -> BoxFuture<'a, StoreResult<DocumentSnapshot>> {
            self.inner.get_document_from_handle(handle)
        }

        fn update_rich_text_document_content<'a>(
            &'a self,
            args: UpdateContentArgs,
        ) -> BoxFuture<'a, StoreResult<bool>> {
            self.inner.update_rich_text_document_content(args)
        }

        fn delete_document<'a>(&'a self, id: DocumentId) -> BoxFuture<'a, StoreResult<()>> {
            self.inner.delete_document(id)
        }

        fn commit_changes<'a>(
            &'a self,
            id: DocumentId,
            message: &'a str,
        ) -> BoxFuture<'a, StoreResult<Option<ChangeHash>>> {
            self.inner.commit_changes(id, message)
        }

        fn list_recent_documents<'a>(
            &'a self,
            limit: usize,
        ) -> BoxFuture<'a, StoreResult<Vec<RecentDocument>>> {
            self.inner.list_recent_documents(limit)
        }
    }

    fn counting_reconciler(
        files: &[(String, String)],
    ) -> (
        ProjectReconciler,
        Arc<InFlightDocuments>,
        Arc<CrdtProjectStore>,
    ) {
        let fs = InMemoryFileSystem::with_files(
            files.iter().map(|(path, content)| (path.as_str(), content.as_str())),
        );
        let documents = Arc::new(InFlightDocuments::new());
        let projects = Arc::new(CrdtProjectStore::new(Arc::new(MemoryStorage::new())));
        let reconciler = ProjectReconciler::new(
            Arc::new(SyncToAsyncFs::new(fs)),
            documents.clone(),
            projects.clone(),
        );
        (reconciler, documents, projects)
    }

    fn numbered_files(count: usize) -> Vec<(String, String)> {
        (0..count)
            .map(|i| (format!("proj/{i:02}.md"), format!("file {i}")))
            .collect()
    }

    #[test]
    fn test_imports_overlap_up_to_the_default_cap() {
        let (reconciler, documents, projects) = counting_reconciler(&numbered_files(15));

        let project_id =
            block_on(reconciler.create_project_from_filesystem_content(Path::new("proj")))
                .unwrap();

        let imported = block_on(projects.list_project_documents(project_id)).unwrap();
        assert_eq!(imported.len(), 15);
        assert_eq!(documents.peak.load(Ordering::SeqCst), MAX_CONCURRENT_OPERATIONS);
        assert_eq!(documents.in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_configured_cap_bounds_new_file_imports() {
        let (reconciler, documents, projects) = counting_reconciler(&numbered_files(12));
        let reconciler = reconciler.with_max_concurrent_operations(4);

        let project_id = block_on(projects.create_project(CreateProjectArgs {
            path: "proj".to_string(),
            documents: IndexMap::new(),
        }))
        .unwrap();
        let report = block_on(
            reconciler.update_project_from_filesystem_content(project_id, Path::new("proj")),
        )
        .unwrap();

        assert_eq!(report.created.len(), 12);
        assert_eq!(documents.peak.load(Ordering::SeqCst), 4);
    }
}

