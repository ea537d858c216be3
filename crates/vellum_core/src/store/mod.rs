//! Document and project stores.
//!
//! The reconciler and front ends only see the [`VersionedDocumentStore`] and
//! [`MultiDocumentProjectStore`] ports. The CRDT-backed implementations keep
//! everything in one [`crate::crdt::CrdtStorage`], so a single SQLite file
//! holds documents, projects and the recent-documents index.

mod documents;
mod projects;
mod recent;
mod types;

pub use documents::{
    CrdtDocumentStore, PassthroughTransform, RepresentationTransform, VersionedDocumentStore,
};
pub use projects::{CrdtProjectStore, MultiDocumentProjectStore};
pub use recent::RecentDocuments;
pub use types::{
    ArtifactMetaData, CreateDocumentArgs, CreateProjectArgs, ProjectId, RecentDocument,
    Representation, UpdateContentArgs,
};
