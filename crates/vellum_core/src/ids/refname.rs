//! Branch and tag name validation.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

static REF_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/-]*[A-Za-z0-9]$").unwrap());

const FORBIDDEN_CHARS: &[char] = &['\\', '~', '^', ':', '?', '*', '[', ']', '{', '}'];

/// Check a branch or tag name against the ref naming rules.
///
/// Names must be at least two characters, start and end with an ASCII
/// alphanumeric, and contain only alphanumerics, `.`, `_`, `/` and `-`.
/// Leading `.` or `/`, trailing `.`, `/` or `.lock`, `..`, `//`, `@{`,
/// whitespace and control characters are all rejected.
pub fn is_valid_branch_or_tag_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if name.starts_with('.') || name.starts_with('/') {
        return false;
    }
    if name.ends_with('.') || name.ends_with('/') || name.ends_with(".lock") {
        return false;
    }
    if name.contains("..") || name.contains("//") || name.contains("@{") {
        return false;
    }
    if name
        .chars()
        .any(|c| FORBIDDEN_CHARS.contains(&c) || c.is_ascii_control() || c.is_whitespace())
    {
        return false;
    }
    REF_NAME.is_match(name)
}

/// A validated branch or tag name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Branch(String);

impl Branch {
    /// Validate `name` and wrap it.
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        if is_valid_branch_or_tag_name(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(ValidationError::new(format!(
                "'{name}' is not a valid branch or tag name"
            )))
        }
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Branch {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Branch {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Branch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Branch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Branch::parse(&raw).map_err(serde::de::Error::custom)
    }
}
