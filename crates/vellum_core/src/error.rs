//! Error types for vellum operations.
//!
//! Every failure is one of a closed set of [`ErrorKind`]s. Each kind has its
//! own leaf type, and each component exposes an enum that is the exact union of
//! the kinds it can produce ([`StoreError`], [`FsError`], [`StorageError`],
//! [`ReconcileError`], [`ConfigError`]). Callers match on the variant or on
//! [`Classified::kind`], never on message text.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

/// The closed set of failure kinds surfaced by vellum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ErrorKind {
    /// The backing store failed (database, disk, corrupt record).
    Repository,
    /// The requested document, project, file or change does not exist.
    NotFound,
    /// Malformed identifier or input.
    Validation,
    /// Permission denied by the filesystem.
    AccessControl,
    /// Content violates an expected invariant, e.g. binary where text was expected.
    DataIntegrity,
    /// The user cancelled the operation.
    Abort,
    /// Persisted schema or format version does not match this build.
    Migration,
}

impl ErrorKind {
    /// Stable name used in serialized errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Repository => "RepositoryError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::AccessControl => "AccessControlError",
            ErrorKind::DataIntegrity => "DataIntegrityError",
            ErrorKind::Abort => "AbortError",
            ErrorKind::Migration => "MigrationError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! leaf_error {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Error)]
        #[error("{}: {message}", $prefix)]
        pub struct $name {
            /// Human-readable description.
            pub message: String,
        }

        impl $name {
            /// Create a new error with the given message.
            pub fn new(message: impl Into<String>) -> Self {
                Self {
                    message: message.into(),
                }
            }
        }
    };
}

leaf_error!(
    /// Backing-store failure.
    RepositoryError,
    "Repository error"
);
leaf_error!(
    /// Something that was looked up does not exist.
    NotFoundError,
    "Not found"
);
leaf_error!(
    /// Malformed identifier or input.
    ValidationError,
    "Invalid input"
);
leaf_error!(
    /// Permission denial.
    AccessControlError,
    "Access denied"
);
leaf_error!(
    /// Content violates an expected invariant.
    DataIntegrityError,
    "Data integrity violation"
);
leaf_error!(
    /// The user cancelled the operation.
    AbortError,
    "Aborted"
);
leaf_error!(
    /// Persisted schema or format does not match this build.
    MigrationError,
    "Migration required"
);

/// Errors that carry an [`ErrorKind`].
pub trait Classified: std::error::Error {
    /// The kind of this failure.
    fn kind(&self) -> ErrorKind;

    /// Convert to a serializable representation for IPC.
    fn to_serializable(&self) -> SerializableError {
        SerializableError {
            kind: self.kind().as_str().to_string(),
            message: self.to_string(),
            path: None,
        }
    }
}

/// Errors raised by the storage adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database or I/O failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A key or identifier was rejected before reaching the database.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The on-disk schema version is not the one this build understands.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

#[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Repository(RepositoryError::new(format!("SQLite error: {err}")))
    }
}

impl Classified for StorageError {
    fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Repository(_) => ErrorKind::Repository,
            StorageError::Validation(_) => ErrorKind::Validation,
            StorageError::Migration(_) => ErrorKind::Migration,
        }
    }
}

/// Result type for storage adapter operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors raised by the document and project stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing-store failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Unknown document, project, artifact or change.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A persisted change record uses a format this build cannot read.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Repository(e) => StoreError::Repository(e),
            StorageError::Validation(e) => StoreError::Validation(e),
            StorageError::Migration(e) => StoreError::Migration(e),
        }
    }
}

impl Classified for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Repository(_) => ErrorKind::Repository,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Migration(_) => ErrorKind::Migration,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// Permission denied.
    #[error(transparent)]
    AccessControl(#[from] AccessControlError),

    /// The file or directory does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The file content is not what was expected (binary instead of text).
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),

    /// Any other I/O failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl FsError {
    /// Map an I/O error on `path` onto the filesystem error kinds.
    pub fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        let message = format!("{}: {}", path.display(), err);
        match err.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(NotFoundError::new(message)),
            std::io::ErrorKind::PermissionDenied => {
                FsError::AccessControl(AccessControlError::new(message))
            }
            std::io::ErrorKind::InvalidData => {
                FsError::DataIntegrity(DataIntegrityError::new(message))
            }
            _ => FsError::Repository(RepositoryError::new(message)),
        }
    }
}

impl Classified for FsError {
    fn kind(&self) -> ErrorKind {
        match self {
            FsError::AccessControl(_) => ErrorKind::AccessControl,
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::DataIntegrity(_) => ErrorKind::DataIntegrity,
            FsError::Repository(_) => ErrorKind::Repository,
        }
    }
}

/// Result type for filesystem operations.
pub type FsResult<T> = std::result::Result<T, FsError>;

/// Errors raised while reconciling a project with a directory.
///
/// The union of the store and filesystem kinds, plus cancellation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A document or project store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A filesystem operation failed.
    #[error(transparent)]
    Filesystem(#[from] FsError),

    /// The run was cancelled.
    #[error(transparent)]
    Abort(#[from] AbortError),
}

impl Classified for ReconcileError {
    fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Store(e) => e.kind(),
            ReconcileError::Filesystem(e) => e.kind(),
            ReconcileError::Abort(_) => ErrorKind::Abort,
        }
    }
}

/// Result type for reconciliation.
pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;

/// Errors raised while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the config file.
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: FsError,
    },

    /// The config file is not valid TOML for [`crate::config::Config`].
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized.
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The platform has no config directory.
    #[error("Could not determine config directory")]
    NoConfigDir,
}

impl Classified for ConfigError {
    fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Io { source, .. } => source.kind(),
            ConfigError::Parse(_) | ConfigError::Serialize(_) => ErrorKind::Validation,
            ConfigError::NoConfigDir => ErrorKind::NotFound,
        }
    }

    fn to_serializable(&self) -> SerializableError {
        let path = match self {
            ConfigError::Io { path, .. } => Some(path.clone()),
            _ => None,
        };
        SerializableError {
            kind: self.kind().as_str().to_string(),
            message: self.to_string(),
            path,
        }
    }
}

/// A serializable representation of a vellum error for IPC.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SerializableError {
    /// Error kind name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Associated path (if applicable)
    #[ts(type = "string | null")]
    pub path: Option<PathBuf>,
}
