//! Multi-document project store.
//!
//! A project is a yrs doc with two maps:
//!
//! ```text
//! Y.Doc
//! ├── Y.Map "meta"
//! │   └── "path" → "/home/me/notes"
//! └── Y.Map "documents"
//!     ├── "vellum:3f2c…" → {"id": "vellum:3f2c…", "name": "a.md", "path": "a.md"}
//!     └── "/blob/main/b.md" → {"id": "/blob/main/b.md", "name": "b.md", "path": "b.md"}
//! ```
//!
//! The full doc state is persisted under `projects/<uuid>/state`.

use std::sync::{Arc, Mutex};

use yrs::updates::decoder::Decode;
use yrs::{Doc, Map, MapRef, Out, ReadTxn, StateVector, Transact, Update};

use super::types::{ArtifactMetaData, CreateProjectArgs, ProjectId};
use crate::crdt::CrdtStorage;
use crate::error::{NotFoundError, RepositoryError, StoreResult};
use crate::fs::BoxFuture;
use crate::ids::ResolvedArtifactId;

const PROJECTS_KEY: &str = "projects";
const STATE_KEY: &str = "state";

/// The name of the Y.Map containing artifact metadata.
const DOCUMENTS_MAP_NAME: &str = "documents";

const META_MAP_NAME: &str = "meta";
const PATH_KEY: &str = "path";

/// Port for the set of artifacts filed under a project.
pub trait MultiDocumentProjectStore: Send + Sync {
    /// Create a project holding `args.documents`.
    fn create_project<'a>(&'a self, args: CreateProjectArgs)
    -> BoxFuture<'a, StoreResult<ProjectId>>;

    /// File `artifact` under the project, replacing an entry with the same id.
    fn add_document_to_project<'a>(
        &'a self,
        project_id: ProjectId,
        artifact: ArtifactMetaData,
    ) -> BoxFuture<'a, StoreResult<()>>;

    /// Look up one artifact. Unknown projects or artifacts are `NotFound`.
    fn find_document_in_project<'a>(
        &'a self,
        project_id: ProjectId,
        id: &'a ResolvedArtifactId,
    ) -> BoxFuture<'a, StoreResult<ArtifactMetaData>>;

    /// Every artifact of the project, ordered by path.
    fn list_project_documents<'a>(
        &'a self,
        project_id: ProjectId,
    ) -> BoxFuture<'a, StoreResult<Vec<ArtifactMetaData>>>;

    /// Remove one artifact from the project. The artifact itself is untouched.
    fn delete_document_from_project<'a>(
        &'a self,
        project_id: ProjectId,
        id: &'a ResolvedArtifactId,
    ) -> BoxFuture<'a, StoreResult<()>>;
}

/// A loaded project doc.
struct ProjectDoc {
    doc: Doc,
    documents: MapRef,
    meta: MapRef,
}

impl ProjectDoc {
    fn new() -> Self {
        let doc = Doc::new();
        let documents = doc.get_or_insert_map(DOCUMENTS_MAP_NAME);
        let meta = doc.get_or_insert_map(META_MAP_NAME);
        Self {
            doc,
            documents,
            meta,
        }
    }

    fn load(storage: &dyn CrdtStorage, id: ProjectId) -> StoreResult<Self> {
        let key = id.key();
        let state = storage
            .load(&[PROJECTS_KEY, key.as_str(), STATE_KEY])?
            .ok_or_else(|| NotFoundError::new(format!("project {id} not found")))?;

        let project = Self::new();
        {
            let mut txn = project.doc.transact_mut();
            let update = Update::decode_v1(&state)
                .map_err(|e| RepositoryError::new(format!("corrupt project state {id}: {e}")))?;
            txn.apply_update(update)
                .map_err(|e| RepositoryError::new(format!("failed to apply project state {id}: {e}")))?;
        }
        Ok(project)
    }

    fn save(&self, storage: &dyn CrdtStorage, id: ProjectId) -> StoreResult<()> {
        let state = {
            let txn = self.doc.transact();
            txn.encode_state_as_update_v1(&StateVector::default())
        };
        let key = id.key();
        storage.save(&[PROJECTS_KEY, key.as_str(), STATE_KEY], &state)?;
        Ok(())
    }

    fn set_path(&self, path: &str) {
        let mut txn = self.doc.transact_mut();
        self.meta.insert(&mut txn, PATH_KEY, path);
    }

    fn path(&self) -> Option<String> {
        let txn = self.doc.transact();
        match self.meta.get(&txn, PATH_KEY) {
            Some(Out::Any(yrs::Any::String(s))) => Some(s.to_string()),
            _ => None,
        }
    }

    fn set_document(&self, artifact: &ArtifactMetaData) -> StoreResult<()> {
        let json = serde_json::to_string(artifact)
            .map_err(|e| RepositoryError::new(format!("failed to encode artifact: {e}")))?;
        let mut txn = self.doc.transact_mut();
        self.documents
            .insert(&mut txn, artifact.id.to_string(), json);
        Ok(())
    }

    fn remove_document(&self, id: &ResolvedArtifactId) -> bool {
        let mut txn = self.doc.transact_mut();
        self.documents.remove(&mut txn, &id.to_string()).is_some()
    }

    fn get_document(&self, id: &ResolvedArtifactId) -> StoreResult<Option<ArtifactMetaData>> {
        let txn = self.doc.transact();
        match self.documents.get(&txn, &id.to_string()) {
            Some(value) => decode_artifact(&value.to_string(&txn)).map(Some),
            None => Ok(None),
        }
    }

    fn list_documents(&self) -> StoreResult<Vec<ArtifactMetaData>> {
        let txn = self.doc.transact();
        let mut documents = self
            .documents
            .iter(&txn)
            .map(|(_, value)| decode_artifact(&value.to_string(&txn)))
            .collect::<StoreResult<Vec<_>>>()?;
        documents.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(documents)
    }
}

fn decode_artifact(json: &str) -> StoreResult<ArtifactMetaData> {
    serde_json::from_str(json)
        .map_err(|e| RepositoryError::new(format!("corrupt artifact entry: {e}")).into())
}

/// [`MultiDocumentProjectStore`] over a [`CrdtStorage`] backend.
pub struct CrdtProjectStore {
    storage: Arc<dyn CrdtStorage>,
    /// Serialises load-modify-save of project docs.
    write_lock: Mutex<()>,
}

impl CrdtProjectStore {
    /// Store backed by `storage`.
    pub fn new(storage: Arc<dyn CrdtStorage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// The directory a project was created from.
    pub fn project_path(&self, project_id: ProjectId) -> StoreResult<Option<String>> {
        Ok(ProjectDoc::load(self.storage.as_ref(), project_id)?.path())
    }

    fn create(&self, args: CreateProjectArgs) -> StoreResult<ProjectId> {
        let id = ProjectId::new();
        let project = ProjectDoc::new();
        project.set_path(&args.path);
        for artifact in args.documents.values() {
            project.set_document(artifact)?;
        }
        project.save(self.storage.as_ref(), id)?;
        log::debug!(
            "Created project {id} with {} documents",
            args.documents.len()
        );
        Ok(id)
    }

    fn add(&self, project_id: ProjectId, artifact: ArtifactMetaData) -> StoreResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let project = ProjectDoc::load(self.storage.as_ref(), project_id)?;
        project.set_document(&artifact)?;
        project.save(self.storage.as_ref(), project_id)
    }

    fn find(&self, project_id: ProjectId, id: &ResolvedArtifactId) -> StoreResult<ArtifactMetaData> {
        ProjectDoc::load(self.storage.as_ref(), project_id)?
            .get_document(id)?
            .ok_or_else(|| {
                NotFoundError::new(format!("{id} is not part of project {project_id}")).into()
            })
    }

    fn list(&self, project_id: ProjectId) -> StoreResult<Vec<ArtifactMetaData>> {
        ProjectDoc::load(self.storage.as_ref(), project_id)?.list_documents()
    }

    fn remove(&self, project_id: ProjectId, id: &ResolvedArtifactId) -> StoreResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let project = ProjectDoc::load(self.storage.as_ref(), project_id)?;
        if !project.remove_document(id) {
            return Err(NotFoundError::new(format!("{id} is not part of project {project_id}")).into());
        }
        project.save(self.storage.as_ref(), project_id)
    }
}

impl MultiDocumentProjectStore for CrdtProjectStore {
    fn create_project<'a>(
        &'a self,
        args: CreateProjectArgs,
    ) -> BoxFuture<'a, StoreResult<ProjectId>> {
        Box::pin(async move { self.create(args) })
    }

    fn add_document_to_project<'a>(
        &'a self,
        project_id: ProjectId,
        artifact: ArtifactMetaData,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.add(project_id, artifact) })
    }

    fn find_document_in_project<'a>(
        &'a self,
        project_id: ProjectId,
        id: &'a ResolvedArtifactId,
    ) -> BoxFuture<'a, StoreResult<ArtifactMetaData>> {
        Box::pin(async move { self.find(project_id, id) })
    }

    fn list_project_documents<'a>(
        &'a self,
        project_id: ProjectId,
    ) -> BoxFuture<'a, StoreResult<Vec<ArtifactMetaData>>> {
        Box::pin(async move { self.list(project_id) })
    }

    fn delete_document_from_project<'a>(
        &'a self,
        project_id: ProjectId,
        id: &'a ResolvedArtifactId,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.remove(project_id, id) })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::crdt::MemoryStorage;
    use crate::error::StoreError;
    use crate::ids::{ContentRef, DocumentId};
    use crate::test_utils::block_on;

    fn create_test_store() -> CrdtProjectStore {
        let storage: Arc<dyn CrdtStorage> = Arc::new(MemoryStorage::new());
        CrdtProjectStore::new(storage)
    }

    fn artifact(id: impl Into<ResolvedArtifactId>, path: &str) -> ArtifactMetaData {
        ArtifactMetaData {
            id: id.into(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
        }
    }

    fn create_project(store: &CrdtProjectStore, artifacts: Vec<ArtifactMetaData>) -> ProjectId {
        let documents: IndexMap<_, _> = artifacts.into_iter().map(|a| (a.id.clone(), a)).collect();
        block_on(store.create_project(CreateProjectArgs {
            path: "/tmp/project".to_string(),
            documents,
        }))
        .unwrap()
    }

    #[test]
    fn test_create_and_list() {
        let store = create_test_store();
        let b = artifact(DocumentId::new(), "sub/b.md");
        let a = artifact(DocumentId::new(), "a.md");
        let id = create_project(&store, vec![b.clone(), a.clone()]);

        let listed = block_on(store.list_project_documents(id)).unwrap();
        assert_eq!(listed, vec![a, b]);
        assert_eq!(
            store.project_path(id).unwrap().as_deref(),
            Some("/tmp/project")
        );
    }

    #[test]
    fn test_add_find_delete() {
        let store = create_test_store();
        let id = create_project(&store, Vec::new());
        let content_ref = ContentRef::parse("/blob/main/notes/c.md").unwrap();
        let entry = artifact(content_ref, "notes/c.md");

        block_on(store.add_document_to_project(id, entry.clone())).unwrap();
        let found = block_on(store.find_document_in_project(id, &entry.id)).unwrap();
        assert_eq!(found, entry);

        block_on(store.delete_document_from_project(id, &entry.id)).unwrap();
        assert!(matches!(
            block_on(store.find_document_in_project(id, &entry.id)),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            block_on(store.delete_document_from_project(id, &entry.id)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_project_is_not_found() {
        let store = create_test_store();
        assert!(matches!(
            block_on(store.list_project_documents(ProjectId::new())),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_add_replaces_entry_with_same_id() {
        let store = create_test_store();
        let doc = DocumentId::new();
        let id = create_project(&store, vec![artifact(doc, "old.md")]);
        block_on(store.add_document_to_project(id, artifact(doc, "new.md"))).unwrap();

        let listed = block_on(store.list_project_documents(id)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "new.md");
    }
}
