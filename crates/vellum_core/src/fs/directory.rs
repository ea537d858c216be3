//! Directory listing and text file reads for project reconciliation.

use std::path::{Path, PathBuf};

use serde::Serialize;
use ts_rs::TS;

use super::AsyncFileSystem;
use crate::error::{DataIntegrityError, FsError, FsResult, NotFoundError};

/// A text file read from a project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct File {
    /// Path relative to the listed directory, `/` separated.
    pub path: String,
    /// File name including extension.
    pub name: String,
    /// UTF-8 text content.
    pub content: String,
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

fn decode_text(path: &Path, bytes: Vec<u8>) -> FsResult<String> {
    let binary = || {
        FsError::DataIntegrity(DataIntegrityError::new(format!(
            "expected a text file but got a binary: {}",
            path.display()
        )))
    };
    if bytes.contains(&0) {
        return Err(binary());
    }
    String::from_utf8(bytes).map_err(|_| binary())
}

/// Read one file as text.
///
/// The returned [`File::path`] is `path` itself with `/` separators. Bytes that
/// are not UTF-8 text, or that contain NUL, fail with
/// [`FsError::DataIntegrity`].
pub async fn read_file(fs: &dyn AsyncFileSystem, path: &Path) -> FsResult<File> {
    let bytes = fs
        .read_binary(path)
        .await
        .map_err(|e| FsError::from_io(path, e))?;
    let content = decode_text(path, bytes)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(File {
        path: to_slash_path(path),
        name,
        content,
    })
}

/// Recursively list the files under `dir` whose extension is in `extensions`.
///
/// Paths in the result are relative to `dir`. Results are sorted by path.
/// Symlinked directories below `dir` are not descended into.
pub async fn list_directory_files(
    fs: &dyn AsyncFileSystem,
    dir: &Path,
    extensions: &[String],
) -> FsResult<Vec<File>> {
    if !fs.is_dir(dir).await {
        return Err(FsError::NotFound(NotFoundError::new(format!(
            "directory not found: {}",
            dir.display()
        ))));
    }

    let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];
    let mut files = Vec::new();
    while let Some(current) = pending.pop() {
        let entries = fs
            .list_files(&current)
            .await
            .map_err(|e| FsError::from_io(&current, e))?;
        for entry in entries {
            if fs.is_dir(&entry).await {
                if fs.is_symlink(&entry).await {
                    log::debug!("Skipping symlinked directory {}", entry.display());
                } else {
                    pending.push(entry);
                }
                continue;
            }
            if !has_extension(&entry, extensions) {
                continue;
            }
            let mut file = read_file(fs, &entry).await?;
            let relative = entry.strip_prefix(dir).unwrap_or(&entry);
            file.path = to_slash_path(relative);
            files.push(file);
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    log::debug!("Listed {} files under {}", files.len(), dir.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Classified;
    use crate::fs::{FileSystem, InMemoryFileSystem, SyncToAsyncFs};
    use crate::test_utils::block_on;

    fn exts() -> Vec<String> {
        vec!["md".to_string(), ".txt".to_string()]
    }

    #[test]
    fn test_lists_recursively_with_relative_paths() {
        let fs = SyncToAsyncFs::new(InMemoryFileSystem::with_files([
            ("proj/notes.txt", "n"),
            ("proj/deep/ideas.MD", "i"),
            ("proj/image.png", "p"),
            ("other/skip.txt", "s"),
        ]));

        let files = block_on(list_directory_files(&fs, Path::new("proj"), &exts())).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["deep/ideas.MD", "notes.txt"]);
        assert_eq!(files[0].name, "ideas.MD");
        assert_eq!(files[1].content, "n");
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let fs = SyncToAsyncFs::new(InMemoryFileSystem::new());
        let err = block_on(list_directory_files(&fs, Path::new("nope"), &exts())).unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[test]
    fn test_binary_file_is_data_integrity_error() {
        let inner = InMemoryFileSystem::new();
        inner
            .write_binary(Path::new("proj/blob.txt"), &[b'a', 0, b'b'])
            .unwrap();
        let fs = SyncToAsyncFs::new(inner);

        let err = block_on(read_file(&fs, Path::new("proj/blob.txt"))).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DataIntegrity);
        assert!(err.to_string().contains("expected a text file but got a binary"));

        let err = block_on(list_directory_files(&fs, Path::new("proj"), &exts())).unwrap_err();
        assert!(matches!(err, FsError::DataIntegrity(_)));
    }
}
