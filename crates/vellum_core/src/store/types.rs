//! Types exchanged with the document and project stores.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::ids::{DocumentId, ResolvedArtifactId};

/// Identity of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Storage key segment for this project.
    pub fn key(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for ProjectId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ValidationError::new(format!("'{s}' is not a project id: {e}")))
    }
}

/// A project's record of "this artifact is filed at this path".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ArtifactMetaData {
    /// Artifact identity
    #[ts(type = "string")]
    pub id: ResolvedArtifactId,
    /// File name
    pub name: String,
    /// Path relative to the project directory, `/` separated
    pub path: String,
}

/// Format of content handed to the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Representation {
    /// Markdown source.
    Markdown,
    /// Plain text.
    Text,
}

impl Representation {
    /// Guess the representation from a file name's extension.
    pub fn from_file_name(name: &str) -> Self {
        let is_markdown = name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("md"));
        if is_markdown {
            Representation::Markdown
        } else {
            Representation::Text
        }
    }
}

/// Arguments for creating a document.
#[derive(Debug, Clone)]
pub struct CreateDocumentArgs {
    /// Title
    pub title: String,
    /// Initial text content
    pub content: String,
}

/// Arguments for replacing a document's content.
#[derive(Debug, Clone)]
pub struct UpdateContentArgs {
    /// Target document
    pub document_id: DocumentId,
    /// Format of `content`
    pub representation: Representation,
    /// New content
    pub content: String,
}

/// Arguments for creating a project.
#[derive(Debug, Clone)]
pub struct CreateProjectArgs {
    /// Directory the project mirrors
    pub path: String,
    /// Initial documents keyed by artifact id
    pub documents: IndexMap<ResolvedArtifactId, ArtifactMetaData>,
}

/// An entry of the recent-documents index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RecentDocument {
    /// Document id
    #[ts(type = "string")]
    pub id: DocumentId,
    /// Title at the time it was recorded
    pub title: String,
    /// Unix timestamp in milliseconds of the last change
    pub opened_at: i64,
}
