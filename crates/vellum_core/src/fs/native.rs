//! Native filesystem implementation.
//!
//! Only available on non-WASM targets.

use std::fs;
use std::io::Result;
use std::path::{Path, PathBuf};

use super::FileSystem;

/// Maps straight onto `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content)
    }

    fn write_binary(&self, path: &Path, content: &[u8]) -> Result<()> {
        fs::write(path, content)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            files.push(entry?.path());
        }
        files.sort();
        Ok(files)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        fs.write_file(&dir.path().join("b.txt"), "b").unwrap();
        fs.write_file(&dir.path().join("a.txt"), "a").unwrap();
        fs.create_dir_all(&dir.path().join("sub")).unwrap();

        let listed = fs.list_files(dir.path()).unwrap();
        assert_eq!(
            listed,
            vec![
                dir.path().join("a.txt"),
                dir.path().join("b.txt"),
                dir.path().join("sub"),
            ]
        );
        assert!(fs.is_dir(&dir.path().join("sub")));
    }

    #[cfg(unix)]
    #[test]
    fn test_is_symlink_does_not_follow() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        fs.create_dir_all(&dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();

        assert!(fs.is_dir(&dir.path().join("link")));
        assert!(fs.is_symlink(&dir.path().join("link")));
        assert!(!fs.is_symlink(&dir.path().join("real")));
        assert!(!fs.is_symlink(&dir.path().join("missing")));
    }
}
