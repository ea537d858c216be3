//! Structural conflicts between a directory and its project history.
//!
//! A structural conflict is a divergence that cannot be merged automatically,
//! such as a path modified on one side and removed on the other. Conflicts are
//! values returned to the caller, never errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ts_rs::TS;

/// Which side of a reconciliation a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ConflictSource {
    /// The project directory on disk.
    Filesystem,
    /// The versioned project in the document store.
    Project,
}

/// A divergence at one path that reconciliation will not resolve on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum StructuralConflict {
    /// Content changed on one side, the path was removed on the other.
    #[serde(rename_all = "camelCase")]
    ModifyDelete {
        /// Path relative to the project directory
        path: String,
        /// Side holding the modification
        modified_in: ConflictSource,
        /// Side that removed the path
        deleted_in: ConflictSource,
    },
    /// Both sides added the path with different content.
    AddAdd {
        /// Path relative to the project directory
        path: String,
    },
}

impl StructuralConflict {
    /// Get the conflicting path
    pub fn path(&self) -> &str {
        match self {
            StructuralConflict::ModifyDelete { path, .. } => path,
            StructuralConflict::AddAdd { path } => path,
        }
    }

    /// Check if this is a modify/delete conflict
    pub fn is_modify_delete(&self) -> bool {
        matches!(self, StructuralConflict::ModifyDelete { .. })
    }
}

/// A change to one path since the last agreed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathChange {
    /// The path did not exist before
    Added {
        /// Path to the file
        path: String,
        /// Content hash
        content_hash: String,
    },
    /// The path existed and its content changed
    Modified {
        /// Path to the file
        path: String,
        /// New content hash
        content_hash: String,
    },
    /// The path was removed
    Deleted {
        /// Path to the deleted file
        path: String,
    },
}

impl PathChange {
    /// Get the path of the changed file
    pub fn path(&self) -> &str {
        match self {
            PathChange::Added { path, .. } => path,
            PathChange::Modified { path, .. } => path,
            PathChange::Deleted { path } => path,
        }
    }

    /// Get the content hash if available
    pub fn content_hash(&self) -> Option<&str> {
        match self {
            PathChange::Added { content_hash, .. } => Some(content_hash),
            PathChange::Modified { content_hash, .. } => Some(content_hash),
            PathChange::Deleted { .. } => None,
        }
    }
}

/// SHA-256 of `content`, hex encoded, for [`PathChange`] hashes.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Classify the structural conflicts between filesystem and project changes.
///
/// Only paths changed on both sides are considered. Modified or added on one
/// side and deleted on the other is a modify/delete conflict; added on both
/// sides with different content is an add/add conflict. Everything else can
/// be merged and is not reported. Results are sorted by path.
pub fn detect_structural_conflicts(
    filesystem: &[PathChange],
    project: &[PathChange],
) -> Vec<StructuralConflict> {
    let project_by_path: BTreeMap<&str, &PathChange> =
        project.iter().map(|c| (c.path(), c)).collect();

    let mut conflicts = Vec::new();
    for fs_change in filesystem {
        let Some(project_change) = project_by_path.get(fs_change.path()) else {
            continue;
        };
        let path = fs_change.path().to_string();

        let conflict = match (fs_change, *project_change) {
            (PathChange::Deleted { .. }, PathChange::Deleted { .. }) => None,
            (PathChange::Deleted { .. }, _) => Some(StructuralConflict::ModifyDelete {
                path,
                modified_in: ConflictSource::Project,
                deleted_in: ConflictSource::Filesystem,
            }),
            (_, PathChange::Deleted { .. }) => Some(StructuralConflict::ModifyDelete {
                path,
                modified_in: ConflictSource::Filesystem,
                deleted_in: ConflictSource::Project,
            }),
            (PathChange::Added { .. }, PathChange::Added { .. })
                if fs_change.content_hash() != project_change.content_hash() =>
            {
                Some(StructuralConflict::AddAdd { path })
            }
            _ => None,
        };

        if let Some(conflict) = conflict {
            log::debug!("Structural conflict at {}: {:?}", conflict.path(), conflict);
            conflicts.push(conflict);
        }
    }

    conflicts.sort_by(|a, b| a.path().cmp(b.path()));
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modified(path: &str, content: &str) -> PathChange {
        PathChange::Modified {
            path: path.to_string(),
            content_hash: content_hash(content),
        }
    }

    fn added(path: &str, content: &str) -> PathChange {
        PathChange::Added {
            path: path.to_string(),
            content_hash: content_hash(content),
        }
    }

    fn deleted(path: &str) -> PathChange {
        PathChange::Deleted {
            path: path.to_string(),
        }
    }

    #[test]
    fn test_modify_delete_both_directions() {
        let conflicts = detect_structural_conflicts(
            &[deleted("b.txt"), modified("a.txt", "new")],
            &[modified("b.txt", "edited"), deleted("a.txt")],
        );
        assert_eq!(
            conflicts,
            vec![
                StructuralConflict::ModifyDelete {
                    path: "a.txt".to_string(),
                    modified_in: ConflictSource::Filesystem,
                    deleted_in: ConflictSource::Project,
                },
                StructuralConflict::ModifyDelete {
                    path: "b.txt".to_string(),
                    modified_in: ConflictSource::Project,
                    deleted_in: ConflictSource::Filesystem,
                },
            ]
        );
        assert!(conflicts.iter().all(StructuralConflict::is_modify_delete));
    }

    #[test]
    fn test_add_add_only_when_content_differs() {
        let conflicts =
            detect_structural_conflicts(&[added("x.md", "one")], &[added("x.md", "two")]);
        assert_eq!(
            conflicts,
            vec![StructuralConflict::AddAdd {
                path: "x.md".to_string()
            }]
        );

        assert!(
            detect_structural_conflicts(&[added("x.md", "same")], &[added("x.md", "same")])
                .is_empty()
        );
    }

    #[test]
    fn test_mergeable_changes_are_not_conflicts() {
        assert!(
            detect_structural_conflicts(
                &[modified("a.txt", "1"), deleted("gone.txt"), added("only-fs.txt", "x")],
                &[modified("a.txt", "2"), deleted("gone.txt")],
            )
            .is_empty()
        );
    }

    #[test]
    fn test_serialized_with_explicit_tag() {
        let json = serde_json::to_value(StructuralConflict::ModifyDelete {
            path: "notes.txt".to_string(),
            modified_in: ConflictSource::Project,
            deleted_in: ConflictSource::Filesystem,
        })
        .unwrap();
        assert_eq!(json["type"], "modifyDelete");
        assert_eq!(json["modifiedIn"], "project");
        assert_eq!(json["deletedIn"], "filesystem");
    }
}
