//! Identifier model.
//!
//! Two identifier spaces meet here. Artifacts are addressed either as a CRDT
//! document (`vellum:<uuid>`) or as a file at a git-like ref
//! (`/blob/<ref>/<path>`); commits are addressed either by CRDT causal heads or
//! by a content hash. All identifiers are value types built only through
//! validating constructors.

mod artifact;
mod commit;
mod encoding;
pub mod refname;

pub use artifact::{
    CONTENT_REF_PREFIX, ContentRef, DOCUMENT_URL_PREFIX, DocumentId, GitRef, ResolvedArtifactId,
    is_content_ref, is_document_url, parse_resolved_artifact_id,
};
pub use commit::{ChangeHash, CommitHash, CommitId, Heads};
pub use encoding::{
    decode_url_encoded_artifact_id, decode_url_encoded_commit_id, decode_url_encoded_content_ref,
    decode_url_encoded_heads, url_encode_artifact_id, url_encode_commit_id, url_encode_content_ref,
    url_encode_heads,
};
pub use refname::{Branch, is_valid_branch_or_tag_name};
