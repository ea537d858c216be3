//! Filesystem abstraction module.
//!
//! This module provides the synchronous `FileSystem` trait, the object-safe
//! `AsyncFileSystem` trait the reconciler reads through, and the
//! `SyncToAsyncFs` adapter joining the two. The `directory` helpers turn a
//! directory tree into [`File`] values with text content.

mod async_fs;
mod directory;
mod memory;
#[cfg(not(target_arch = "wasm32"))]
mod native;

use std::io::Result;
use std::path::{Path, PathBuf};

pub use async_fs::{AsyncFileSystem, BoxFuture, SyncToAsyncFs};
pub use directory::{File, list_directory_files, read_file};
pub use memory::InMemoryFileSystem;
#[cfg(not(target_arch = "wasm32"))]
pub use native::RealFileSystem;

/// Synchronous abstraction over filesystem operations.
pub trait FileSystem {
    /// Reads the file content as a string.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Reads the raw bytes of a file.
    fn read_binary(&self, path: &Path) -> Result<Vec<u8>>;

    /// Creates or overwrites a file with text content.
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Creates or overwrites a file with binary content.
    fn write_binary(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Deletes a file.
    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Lists the direct children (files and directories) of a directory.
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Checks if a file or directory exists.
    fn exists(&self, path: &Path) -> bool;

    /// Checks if a path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Checks if a path is itself a symbolic link, without following it.
    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }

    /// Creates a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}
