//! The `files` table and the POSIX-like operations over it.
//!
//! ```text
//! files(path TEXT PRIMARY KEY, content BLOB, mode INTEGER, ctime INTEGER, mtime INTEGER)
//! ```
//!
//! Only regular files have rows. Times are Unix milliseconds.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::path::{ROOT, ancestors, normalize_path};
use super::{Errno, VfsError, VfsResult};
use crate::crdt::escape_glob;

/// Mode reported for every directory.
pub const DIRECTORY_MODE: u32 = 0o40755;

/// Mode given to files written without one.
pub const DEFAULT_FILE_MODE: u32 = 0o100644;

const REGULAR_FILE_TYPE: u32 = 0o100000;
const PERMISSION_BITS: u32 = 0o7777;

fn file_mode(mode: u32) -> u32 {
    REGULAR_FILE_TYPE | (mode & PERMISSION_BITS)
}

/// First eight bytes of the SHA-256 of `bytes`.
fn inode(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    let mut ino = [0u8; 8];
    ino.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(ino)
}

fn descendants_pattern(path: &str) -> String {
    format!("{}/*", escape_glob(path))
}

/// Kind of a VFS entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
}

/// Result of [`SqliteVfs::stat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stat {
    /// Entry kind
    pub file_type: FileType,
    /// POSIX mode including the file type bits
    pub mode: u32,
    /// Size in bytes; 0 for directories
    pub size: u64,
    /// Inode number
    pub ino: u64,
    /// Status change time, Unix milliseconds
    pub ctime_ms: i64,
    /// Modification time, Unix milliseconds
    pub mtime_ms: i64,
}

impl Stat {
    /// Whether this is a regular file.
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    /// Whether this is a directory.
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// A POSIX-like filesystem stored in one SQLite table.
///
/// Paths are normalised with [`normalize_path`] before use. Directories have
/// no rows; one exists while a file lives below it, and the root always
/// exists.
///
/// # Thread Safety
///
/// The connection is wrapped in a `Mutex` for thread-safe access.
pub struct SqliteVfs {
    conn: Mutex<Connection>,
}

impl SqliteVfs {
    /// Open or create a filesystem in the SQLite database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> VfsResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory filesystem for testing.
    pub fn in_memory() -> VfsResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> VfsResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                content BLOB NOT NULL,
                mode INTEGER NOT NULL,
                ctime INTEGER NOT NULL,
                mtime INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn is_file(conn: &Connection, path: &str) -> VfsResult<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM files WHERE path = ?1)",
            params![path],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn has_descendants(conn: &Connection, path: &str) -> VfsResult<bool> {
        let exists: bool = if path == ROOT {
            conn.query_row("SELECT EXISTS(SELECT 1 FROM files)", [], |row| row.get(0))?
        } else {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM files WHERE path GLOB ?1)",
                params![descendants_pattern(path)],
                |row| row.get(0),
            )?
        };
        Ok(exists)
    }

    /// Fail with `ENOTDIR` when an ancestor of `path` is a file.
    fn check_ancestors(conn: &Connection, path: &str, operation: &'static str) -> VfsResult<()> {
        for ancestor in ancestors(path) {
            if Self::is_file(conn, ancestor)? {
                return Err(VfsError::posix(Errno::ENOTDIR, operation, path));
            }
        }
        Ok(())
    }

    /// Read a whole file.
    pub fn read_file(&self, path: &str) -> VfsResult<Vec<u8>> {
        let path = normalize_path(path);
        let conn = self.conn.lock().unwrap();
        let content: Option<Vec<u8>> = conn
            .query_row(
                "SELECT content FROM files WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        match content {
            Some(content) => Ok(content),
            None if Self::has_descendants(&conn, &path)? || path == ROOT => {
                Err(VfsError::posix(Errno::EISDIR, "open", &path))
            }
            None => Err(VfsError::posix(Errno::ENOENT, "open", &path)),
        }
    }

    /// Create or replace a file.
    ///
    /// `mode` keeps its permission bits only; `None` keeps the current mode,
    /// or [`DEFAULT_FILE_MODE`] for new files. `mtime` always advances and
    /// `ctime` advances only when the mode changes.
    pub fn write_file(&self, path: &str, data: &[u8], mode: Option<u32>) -> VfsResult<()> {
        let path = normalize_path(path);
        let conn = self.conn.lock().unwrap();
        if path == ROOT || Self::has_descendants(&conn, &path)? {
            return Err(VfsError::posix(Errno::EISDIR, "open", &path));
        }
        Self::check_ancestors(&conn, &path, "open")?;

        let existing: Option<(u32, i64, i64)> = conn
            .query_row(
                "SELECT mode, ctime, mtime FROM files WHERE path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let now = chrono::Utc::now().timestamp_millis();
        let (mode, ctime, mtime) = match existing {
            Some((old_mode, old_ctime, old_mtime)) => {
                let mode = mode.map(file_mode).unwrap_or(old_mode);
                let ctime = if mode == old_mode {
                    old_ctime
                } else {
                    now.max(old_ctime + 1)
                };
                (mode, ctime, now.max(old_mtime + 1))
            }
            None => (mode.map(file_mode).unwrap_or(DEFAULT_FILE_MODE), now, now),
        };

        conn.execute(
            "INSERT INTO files (path, content, mode, ctime, mtime) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                content = excluded.content,
                mode = excluded.mode,
                ctime = excluded.ctime,
                mtime = excluded.mtime",
            params![path, data, mode, ctime, mtime],
        )?;
        log::debug!("vfs: wrote {} bytes to {path}", data.len());
        Ok(())
    }

    /// Remove a file.
    pub fn unlink(&self, path: &str) -> VfsResult<()> {
        let path = normalize_path(path);
        let conn = self.conn.lock().unwrap();
        if path == ROOT {
            return Err(VfsError::posix(Errno::EISDIR, "unlink", &path));
        }
        let removed = conn.execute("DELETE FROM files WHERE path = ?1", params![path])?;
        if removed == 0 {
            let errno = if Self::has_descendants(&conn, &path)? {
                Errno::EISDIR
            } else {
                Errno::ENOENT
            };
            return Err(VfsError::posix(errno, "unlink", &path));
        }
        Ok(())
    }

    /// Names of the direct children of a directory, sorted.
    ///
    /// The root lists as empty when there are no files; any other path with
    /// nothing below it is `ENOENT`.
    pub fn readdir(&self, path: &str) -> VfsResult<Vec<String>> {
        let path = normalize_path(path);
        let conn = self.conn.lock().unwrap();
        if path != ROOT && Self::is_file(&conn, &path)? {
            return Err(VfsError::posix(Errno::ENOTDIR, "scandir", &path));
        }

        let paths: Vec<String> = if path == ROOT {
            let mut stmt = conn.prepare("SELECT path FROM files")?;
            let rows: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            rows
        } else {
            let mut stmt = conn.prepare("SELECT path FROM files WHERE path GLOB ?1")?;
            let rows: Vec<String> = stmt
                .query_map(params![descendants_pattern(&path)], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };

        let prefix_len = if path == ROOT { 0 } else { path.len() + 1 };
        let mut names: Vec<String> = paths
            .iter()
            .map(|p| {
                let rest = &p[prefix_len..];
                rest.split_once('/').map_or(rest, |(head, _)| head).to_string()
            })
            .collect();
        names.sort();
        names.dedup();

        if names.is_empty() && path != ROOT {
            return Err(VfsError::posix(Errno::ENOENT, "scandir", &path));
        }
        Ok(names)
    }

    /// Metadata for a file or directory.
    ///
    /// Directories are synthetic: mode [`DIRECTORY_MODE`], size 0, an inode
    /// derived from the path and the newest `mtime` below them.
    pub fn stat(&self, path: &str) -> VfsResult<Stat> {
        let path = normalize_path(path);
        let conn = self.conn.lock().unwrap();

        let file: Option<(Vec<u8>, u32, i64, i64)> = conn
            .query_row(
                "SELECT content, mode, ctime, mtime FROM files WHERE path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        if let Some((content, mode, ctime, mtime)) = file {
            return Ok(Stat {
                file_type: FileType::File,
                mode,
                size: content.len() as u64,
                ino: inode(&content),
                ctime_ms: ctime,
                mtime_ms: mtime,
            });
        }

        let newest: Option<i64> = if path == ROOT {
            conn.query_row("SELECT MAX(mtime) FROM files", [], |row| row.get(0))?
        } else {
            conn.query_row(
                "SELECT MAX(mtime) FROM files WHERE path GLOB ?1",
                params![descendants_pattern(&path)],
                |row| row.get(0),
            )?
        };
        if newest.is_none() && path != ROOT {
            return Err(VfsError::posix(Errno::ENOENT, "stat", &path));
        }
        let time = newest.unwrap_or(0);
        Ok(Stat {
            file_type: FileType::Directory,
            mode: DIRECTORY_MODE,
            size: 0,
            ino: inode(path.as_bytes()),
            ctime_ms: time,
            mtime_ms: time,
        })
    }

    /// Same as [`stat`](Self::stat); there are no symlinks.
    pub fn lstat(&self, path: &str) -> VfsResult<Stat> {
        self.stat(path)
    }

    /// Create a directory.
    ///
    /// Directories are implicit, so this only checks that nothing is in the
    /// way.
    pub fn mkdir(&self, path: &str) -> VfsResult<()> {
        let path = normalize_path(path);
        if path == ROOT {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        if Self::is_file(&conn, &path)? {
            return Err(VfsError::posix(Errno::EEXIST, "mkdir", &path));
        }
        Self::check_ancestors(&conn, &path, "mkdir")
    }

    /// Remove an empty directory.
    pub fn rmdir(&self, path: &str) -> VfsResult<()> {
        let path = normalize_path(path);
        if path == ROOT {
            return Err(VfsError::Unsupported {
                operation: "rmdir",
                path,
            });
        }
        let conn = self.conn.lock().unwrap();
        if Self::is_file(&conn, &path)? {
            return Err(VfsError::posix(Errno::ENOTDIR, "rmdir", &path));
        }
        if Self::has_descendants(&conn, &path)? {
            return Err(VfsError::posix(Errno::ENOTEMPTY, "rmdir", &path));
        }
        Ok(())
    }

    /// Change a file's permission bits. Directories accept and ignore it.
    pub fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        let path = normalize_path(path);
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().timestamp_millis();
        let updated = conn.execute(
            "UPDATE files SET
                ctime = CASE WHEN mode = ?1 THEN ctime ELSE MAX(?2, ctime + 1) END,
                mode = ?1
             WHERE path = ?3",
            params![file_mode(mode), now, path],
        )?;
        if updated == 0 && path != ROOT && !Self::has_descendants(&conn, &path)? {
            return Err(VfsError::posix(Errno::ENOENT, "chmod", &path));
        }
        Ok(())
    }

    /// Symlinks are not supported.
    pub fn symlink(&self, _target: &str, path: &str) -> VfsResult<()> {
        Err(VfsError::Unsupported {
            operation: "symlink",
            path: normalize_path(path),
        })
    }

    /// Symlinks are not supported.
    pub fn readlink(&self, path: &str) -> VfsResult<String> {
        Err(VfsError::Unsupported {
            operation: "readlink",
            path: normalize_path(path),
        })
    }
}
