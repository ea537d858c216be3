//! Artifact identifiers: CRDT documents and content references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::commit::CommitHash;
use super::refname::Branch;
use crate::error::ValidationError;

/// Scheme prefix of a document URL.
pub const DOCUMENT_URL_PREFIX: &str = "vellum:";

/// Prefix of a content reference.
pub const CONTENT_REF_PREFIX: &str = "/blob/";

/// Identity of a CRDT-backed document.
///
/// Displayed as its document URL, `vellum:<uuid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Storage key segment for this document (the bare UUID).
    pub fn key(&self) -> String {
        self.0.to_string()
    }

    /// Parse a document URL (`vellum:<uuid>`).
    pub fn parse_url(input: &str) -> Result<Self, ValidationError> {
        let rest = input.strip_prefix(DOCUMENT_URL_PREFIX).ok_or_else(|| {
            ValidationError::new(format!("'{input}' is not a document url"))
        })?;
        Uuid::parse_str(rest)
            .map(Self)
            .map_err(|e| ValidationError::new(format!("'{input}' is not a document url: {e}")))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DOCUMENT_URL_PREFIX}{}", self.0.hyphenated())
    }
}

/// Accepts either a document URL or a bare UUID.
impl FromStr for DocumentId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(DOCUMENT_URL_PREFIX) {
            return Self::parse_url(s);
        }
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ValidationError::new(format!("'{s}' is not a document id: {e}")))
    }
}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The ref half of a content reference.
///
/// A ref that is a valid commit hash is always classified as [`GitRef::Commit`],
/// even when it would also be a valid branch name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GitRef {
    /// A commit hash.
    Commit(CommitHash),
    /// A branch or tag name.
    Branch(Branch),
}

impl GitRef {
    /// Classify a raw ref segment.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if CommitHash::is_valid(raw) {
            return CommitHash::parse(raw).map(GitRef::Commit);
        }
        Branch::parse(raw).map(GitRef::Branch)
    }

    /// The ref as written.
    pub fn as_str(&self) -> &str {
        match self {
            GitRef::Commit(hash) => hash.as_str(),
            GitRef::Branch(branch) => branch.as_str(),
        }
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file at a git-like ref: `/blob/<ref>/<path>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentRef {
    git_ref: GitRef,
    path: String,
}

impl ContentRef {
    /// Build a content reference from its parts.
    ///
    /// Branch refs must survive a trip through `/blob/<ref>/<path>`: a branch
    /// containing `/` or spelled like a commit hash is rejected.
    pub fn new(git_ref: GitRef, path: impl Into<String>) -> Result<Self, ValidationError> {
        if let GitRef::Branch(branch) = &git_ref {
            let name = branch.as_str();
            if name.contains('/') {
                return Err(ValidationError::new(format!(
                    "branch '{name}' cannot be used in a content ref: it contains '/'"
                )));
            }
            if CommitHash::is_valid(name) {
                return Err(ValidationError::new(format!(
                    "branch '{name}' cannot be used in a content ref: it reads as a commit hash"
                )));
            }
        }
        let path = path.into();
        if !path.split('/').any(|segment| !segment.is_empty()) {
            return Err(ValidationError::new(format!(
                "content ref path '{path}' has no non-empty segment"
            )));
        }
        Ok(Self { git_ref, path })
    }

    /// Parse `/blob/<ref>/<path>`. The ref is the first segment after the prefix.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let rest = input.strip_prefix(CONTENT_REF_PREFIX).ok_or_else(|| {
            ValidationError::new(format!("'{input}' does not start with {CONTENT_REF_PREFIX}"))
        })?;
        let (raw_ref, path) = rest.split_once('/').ok_or_else(|| {
            ValidationError::new(format!("'{input}' is missing a path after the ref"))
        })?;
        Self::new(GitRef::parse(raw_ref)?, path)
    }

    /// The ref.
    pub fn git_ref(&self) -> &GitRef {
        &self.git_ref
    }

    /// The path within the ref.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CONTENT_REF_PREFIX}{}/{}", self.git_ref, self.path)
    }
}

impl FromStr for ContentRef {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The stable identity of "a document at a location".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedArtifactId {
    /// A CRDT-backed document.
    Document(DocumentId),
    /// A file at a git-like ref.
    ContentRef(ContentRef),
}

impl ResolvedArtifactId {
    /// Whether this identifies a content reference.
    pub fn is_content_ref(&self) -> bool {
        matches!(self, ResolvedArtifactId::ContentRef(_))
    }

    /// Whether this identifies a CRDT document.
    pub fn is_document_url(&self) -> bool {
        matches!(self, ResolvedArtifactId::Document(_))
    }

    /// The document id, if this is a document.
    pub fn document_id(&self) -> Option<DocumentId> {
        match self {
            ResolvedArtifactId::Document(id) => Some(*id),
            ResolvedArtifactId::ContentRef(_) => None,
        }
    }
}

/// Parse either identifier form.
pub fn parse_resolved_artifact_id(input: &str) -> Result<ResolvedArtifactId, ValidationError> {
    if input.starts_with(DOCUMENT_URL_PREFIX) {
        return DocumentId::parse_url(input).map(ResolvedArtifactId::Document);
    }
    if input.starts_with(CONTENT_REF_PREFIX) {
        return ContentRef::parse(input).map(ResolvedArtifactId::ContentRef);
    }
    Err(ValidationError::new(format!(
        "'{input}' is neither a document url nor a content ref"
    )))
}

/// Whether `input` parses as a content reference.
pub fn is_content_ref(input: &str) -> bool {
    ContentRef::parse(input).is_ok()
}

/// Whether `input` parses as a document URL.
pub fn is_document_url(input: &str) -> bool {
    DocumentId::parse_url(input).is_ok()
}

impl fmt::Display for ResolvedArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedArtifactId::Document(id) => id.fmt(f),
            ResolvedArtifactId::ContentRef(content_ref) => content_ref.fmt(f),
        }
    }
}

impl FromStr for ResolvedArtifactId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_resolved_artifact_id(s)
    }
}

impl From<DocumentId> for ResolvedArtifactId {
    fn from(id: DocumentId) -> Self {
        ResolvedArtifactId::Document(id)
    }
}

impl From<ContentRef> for ResolvedArtifactId {
    fn from(content_ref: ContentRef) -> Self {
        ResolvedArtifactId::ContentRef(content_ref)
    }
}

impl Serialize for ResolvedArtifactId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResolvedArtifactId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_resolved_artifact_id(&raw).map_err(serde::de::Error::custom)
    }
}
