//! In-memory filesystem, used by tests and hosts without disk access.

use std::collections::{HashMap, HashSet};
use std::io::{Error, ErrorKind, Result};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::FileSystem;

/// An in-memory filesystem implementation.
///
/// Files are stored as bytes; [`FileSystem::read_to_string`] fails with
/// `InvalidData` when the bytes are not UTF-8. Directories are created
/// implicitly for every written file.
#[derive(Clone, Default)]
pub struct InMemoryFileSystem {
    files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
    directories: Arc<RwLock<HashSet<PathBuf>>>,
}

impl InMemoryFileSystem {
    /// Create a new empty in-memory filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filesystem pre-populated with text files
    pub fn with_files<P: Into<PathBuf>, S: Into<String>>(
        entries: impl IntoIterator<Item = (P, S)>,
    ) -> Self {
        let fs = Self::new();
        {
            let mut files = fs.files.write().unwrap();
            let mut dirs = fs.directories.write().unwrap();
            for (path, content) in entries {
                let path = Self::normalize_path(&path.into());
                Self::insert_parents(&mut dirs, &path);
                files.insert(path, content.into().into_bytes());
            }
        }
        fs
    }

    /// Get a list of all file paths in the filesystem
    pub fn list_all_files(&self) -> Vec<PathBuf> {
        let files = self.files.read().unwrap();
        files.keys().cloned().collect()
    }

    /// Remove `.` components and resolve `..` where possible.
    fn normalize_path(path: &Path) -> PathBuf {
        let mut components = Vec::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    components.pop();
                }
                c => components.push(c),
            }
        }
        components.iter().collect()
    }

    fn insert_parents(dirs: &mut HashSet<PathBuf>, path: &Path) {
        let mut current = path;
        while let Some(parent) = current.parent() {
            if !parent.as_os_str().is_empty() {
                dirs.insert(parent.to_path_buf());
            }
            current = parent;
        }
    }

    fn store(&self, path: &Path, content: Vec<u8>) -> Result<()> {
        let normalized = Self::normalize_path(path);
        if self.directories.read().unwrap().contains(&normalized) {
            return Err(Error::new(
                ErrorKind::IsADirectory,
                format!("Is a directory: {:?}", path),
            ));
        }
        Self::insert_parents(&mut self.directories.write().unwrap(), &normalized);
        self.files.write().unwrap().insert(normalized, content);
        Ok(())
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read_binary(path)?;
        String::from_utf8(bytes).map_err(|e| Error::new(ErrorKind::InvalidData, e))
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        let normalized = Self::normalize_path(path);
        let files = self.files.read().unwrap();
        files
            .get(&normalized)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("File not found: {:?}", path)))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.store(path, content.as_bytes().to_vec())
    }

    fn write_binary(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.store(path, content.to_vec())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        let normalized = Self::normalize_path(path);
        let mut files = self.files.write().unwrap();
        files
            .remove(&normalized)
            .map(|_| ())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("File not found: {:?}", path)))
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let normalized = Self::normalize_path(dir);
        let files = self.files.read().unwrap();
        let dirs = self.directories.read().unwrap();
        if !dirs.contains(&normalized) && !normalized.as_os_str().is_empty() {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("Directory not found: {:?}", dir),
            ));
        }

        let mut children: Vec<PathBuf> = files
            .keys()
            .chain(dirs.iter())
            .filter(|p| p.parent() == Some(normalized.as_path()))
            .cloned()
            .collect();
        children.sort();
        children.dedup();
        Ok(children)
    }

    fn exists(&self, path: &Path) -> bool {
        let normalized = Self::normalize_path(path);
        self.files.read().unwrap().contains_key(&normalized)
            || self.directories.read().unwrap().contains(&normalized)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let normalized = Self::normalize_path(path);
        self.directories.read().unwrap().contains(&normalized)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let normalized = Self::normalize_path(path);
        let mut dirs = self.directories.write().unwrap();
        Self::insert_parents(&mut dirs, &normalized);
        if !normalized.as_os_str().is_empty() {
            dirs.insert(normalized);
        }
        Ok(())
    }
}
