//! Percent-encoding of identifiers for navigable URLs.
//!
//! Decoders run on untrusted or stale URLs, so they return `None` on any
//! failure instead of an error.

use super::artifact::{ContentRef, ResolvedArtifactId, parse_resolved_artifact_id};
use super::commit::{CommitHash, CommitId, Heads};

/// Percent-encode a content reference as one opaque path segment.
pub fn url_encode_content_ref(content_ref: &ContentRef) -> String {
    urlencoding::encode(&content_ref.to_string()).into_owned()
}

/// Inverse of [`url_encode_content_ref`].
pub fn decode_url_encoded_content_ref(encoded: &str) -> Option<ContentRef> {
    let decoded = urlencoding::decode(encoded).ok()?;
    ContentRef::parse(&decoded).ok()
}

/// Percent-encode any artifact id.
pub fn url_encode_artifact_id(id: &ResolvedArtifactId) -> String {
    urlencoding::encode(&id.to_string()).into_owned()
}

/// Inverse of [`url_encode_artifact_id`].
pub fn decode_url_encoded_artifact_id(encoded: &str) -> Option<ResolvedArtifactId> {
    let decoded = urlencoding::decode(encoded).ok()?;
    parse_resolved_artifact_id(&decoded).ok()
}

fn heads_json(heads: &Heads) -> String {
    serde_json::Value::from(heads.iter().map(|h| h.as_str()).collect::<Vec<_>>()).to_string()
}

/// Serialize heads as a JSON array, then percent-encode.
pub fn url_encode_heads(heads: &Heads) -> String {
    urlencoding::encode(&heads_json(heads)).into_owned()
}

/// Inverse of [`url_encode_heads`].
pub fn decode_url_encoded_heads(encoded: &str) -> Option<Heads> {
    let decoded = urlencoding::decode(encoded).ok()?;
    serde_json::from_str(&decoded).ok()
}

/// Percent-encode a commit id: heads as JSON, hashes as-is.
pub fn url_encode_commit_id(id: &CommitId) -> String {
    match id {
        CommitId::Heads(heads) => url_encode_heads(heads),
        CommitId::Hash(hash) => urlencoding::encode(hash.as_str()).into_owned(),
    }
}

/// Inverse of [`url_encode_commit_id`].
pub fn decode_url_encoded_commit_id(encoded: &str) -> Option<CommitId> {
    let decoded = urlencoding::decode(encoded).ok()?;
    if decoded.starts_with('[') {
        serde_json::from_str::<Heads>(&decoded)
            .ok()
            .map(CommitId::Heads)
    } else {
        CommitHash::parse(&decoded).ok().map(CommitId::Hash)
    }
}
