//! Commit identifiers across the two addressing schemes.
//!
//! A [`CommitId`] names either a CRDT state by its causal [`Heads`] or a
//! content-addressed snapshot by its [`CommitHash`]. The two never compare
//! equal to each other.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Hash of a single change in a document's change log (SHA-256, lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeHash(String);

impl ChangeHash {
    /// Length of the hex encoding.
    pub const HEX_LEN: usize = 64;

    /// Validate a hex string as a change hash.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if s.len() == Self::HEX_LEN && is_lower_hex(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ValidationError::new(format!("'{s}' is not a change hash")))
        }
    }

    /// Build from a raw 32-byte digest.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// The hash as hex.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ChangeHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChangeHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ChangeHash::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// The frontier of a document's change graph.
///
/// Heads are a set: two values with the same members are equal regardless of
/// the order they were collected in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Heads(BTreeSet<ChangeHash>);

impl Heads {
    /// An empty frontier (the state before any change).
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the frontier is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of heads.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether `hash` is one of the heads.
    pub fn contains(&self, hash: &ChangeHash) -> bool {
        self.0.contains(hash)
    }

    /// Iterate in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeHash> {
        self.0.iter()
    }

    pub(crate) fn insert(&mut self, hash: ChangeHash) {
        self.0.insert(hash);
    }

    pub(crate) fn remove(&mut self, hash: &ChangeHash) {
        self.0.remove(hash);
    }
}

impl FromIterator<ChangeHash> for Heads {
    fn from_iter<I: IntoIterator<Item = ChangeHash>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Heads {
    type Item = &'a ChangeHash;
    type IntoIter = std::collections::btree_set::Iter<'a, ChangeHash>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A content-addressed commit hash: 4 to 40 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitHash(String);

impl CommitHash {
    /// Whether `s` has the shape of a commit hash.
    pub fn is_valid(s: &str) -> bool {
        (4..=40).contains(&s.len()) && is_lower_hex(s)
    }

    /// Validate and wrap.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ValidationError::new(format!("'{s}' is not a commit hash")))
        }
    }

    /// The hash as hex.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CommitHash {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for CommitHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CommitHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CommitHash::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Identity of a commit in either addressing scheme.
///
/// Serialized untagged: heads as a JSON array of change hashes, a commit hash
/// as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommitId {
    /// CRDT causal heads.
    Heads(Heads),
    /// Content-addressed hash.
    Hash(CommitHash),
}

impl CommitId {
    /// The heads, if this is a CRDT commit id.
    pub fn as_heads(&self) -> Option<&Heads> {
        match self {
            CommitId::Heads(heads) => Some(heads),
            CommitId::Hash(_) => None,
        }
    }
}

impl From<Heads> for CommitId {
    fn from(heads: Heads) -> Self {
        CommitId::Heads(heads)
    }
}

impl From<CommitHash> for CommitId {
    fn from(hash: CommitHash) -> Self {
        CommitId::Hash(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> ChangeHash {
        ChangeHash::from_digest(&[byte; 32])
    }

    #[test]
    fn test_heads_compare_as_sets() {
        let a: Heads = [hash(1), hash(2)].into_iter().collect();
        let b: Heads = [hash(2), hash(1)].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(CommitId::Heads(a.clone()), CommitId::Heads(b));

        let c: Heads = [hash(1)].into_iter().collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_cross_variant_never_equal() {
        let heads = CommitId::Heads(Heads::new());
        let commit = CommitId::Hash(CommitHash::parse("abcd").unwrap());
        assert_ne!(heads, commit);
    }

    #[test]
    fn test_commit_hash_bounds() {
        assert!(CommitHash::is_valid("abcd"));
        assert!(CommitHash::is_valid(&"f".repeat(40)));
        assert!(!CommitHash::is_valid("abc"));
        assert!(!CommitHash::is_valid(&"f".repeat(41)));
        assert!(!CommitHash::is_valid("ABCD"));
        assert!(!CommitHash::is_valid("ghij"));
    }

    #[test]
    fn test_change_hash_validation() {
        assert!(ChangeHash::parse(&"0".repeat(64)).is_ok());
        assert!(ChangeHash::parse(&"0".repeat(63)).is_err());
        assert!(ChangeHash::parse(&"G".repeat(64)).is_err());
    }

    #[test]
    fn test_commit_id_serde_shapes() {
        let heads: Heads = [hash(7)].into_iter().collect();
        let json = serde_json::to_string(&CommitId::Heads(heads.clone())).unwrap();
        assert!(json.starts_with('['));
        let back: CommitId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CommitId::Heads(heads));

        let back: CommitId = serde_json::from_str("\"deadbeef\"").unwrap();
        assert_eq!(back, CommitId::Hash(CommitHash::parse("deadbeef").unwrap()));
    }
}
