//! SQLite-backed virtual filesystem.
//!
//! [`SqliteVfs`] gives a git-compatible engine a small POSIX-like filesystem
//! whose files all live in one SQLite table. Directories are implicit: a
//! directory exists while some file lives below it.

mod path;
mod sqlite_vfs;

use std::fmt;

use thiserror::Error;

use crate::error::{Classified, ErrorKind, StorageError};

pub use path::{ROOT, normalize_path};
pub use sqlite_vfs::{DEFAULT_FILE_MODE, DIRECTORY_MODE, FileType, SqliteVfs, Stat};

/// POSIX error code carried by a [`VfsError`].
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    /// No such file or directory
    ENOENT,
    /// Not a directory
    ENOTDIR,
    /// Is a directory
    EISDIR,
    /// File exists
    EEXIST,
    /// Directory not empty
    ENOTEMPTY,
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (code, text) = match self {
            Errno::ENOENT => ("ENOENT", "no such file or directory"),
            Errno::ENOTDIR => ("ENOTDIR", "not a directory"),
            Errno::EISDIR => ("EISDIR", "illegal operation on a directory"),
            Errno::EEXIST => ("EEXIST", "file already exists"),
            Errno::ENOTEMPTY => ("ENOTEMPTY", "directory not empty"),
        };
        write!(f, "{code}: {text}")
    }
}

/// Errors raised by the virtual filesystem.
#[derive(Debug, Error)]
pub enum VfsError {
    /// A POSIX-style failure on `path`.
    #[error("{errno}, {operation} '{path}'")]
    Posix {
        /// Error code
        errno: Errno,
        /// Operation that failed
        operation: &'static str,
        /// Normalised path
        path: String,
    },

    /// The operation is not implemented by this filesystem.
    #[error("{operation} is not supported: '{path}'")]
    Unsupported {
        /// Operation that was attempted
        operation: &'static str,
        /// Normalised path
        path: String,
    },

    /// The database failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl VfsError {
    pub(crate) fn posix(errno: Errno, operation: &'static str, path: &str) -> Self {
        VfsError::Posix {
            errno,
            operation,
            path: path.to_string(),
        }
    }

    /// The POSIX error code, if this is a POSIX-style failure.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            VfsError::Posix { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for VfsError {
    fn from(err: rusqlite::Error) -> Self {
        VfsError::Storage(err.into())
    }
}

impl Classified for VfsError {
    fn kind(&self) -> ErrorKind {
        match self {
            VfsError::Posix {
                errno: Errno::ENOENT,
                ..
            } => ErrorKind::NotFound,
            VfsError::Posix { .. } | VfsError::Unsupported { .. } => ErrorKind::Validation,
            VfsError::Storage(e) => e.kind(),
        }
    }
}

/// Result type for virtual filesystem operations.
pub type VfsResult<T> = std::result::Result<T, VfsError>;
