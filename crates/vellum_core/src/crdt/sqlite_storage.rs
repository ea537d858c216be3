//! SQLite-backed storage implementation for CRDT persistence.
//!
//! All chunks live in one table `(key TEXT PRIMARY KEY, value BLOB)` with
//! `/`-joined keys. Range queries use `GLOB` with the prefix's metacharacters
//! escaped. A singleton `adapter_info` row records the schema version; a
//! database written by a different version is refused rather than upgraded.

use std::path::Path;
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};

use super::storage::{
    CrdtStorage, DEFAULT_TABLE, StorageEntry, join_key, join_prefix, split_key,
};
use crate::error::{MigrationError, StorageResult, ValidationError};

/// Schema version written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Name of the versioning engine recorded in `adapter_info`.
pub const VERSION_CONTROL_SYSTEM: &str = "yrs";

const ADAPTER_INFO_TABLE: &str = "adapter_info";

static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Check that `name` is usable as the chunk table.
///
/// Names are plain identifiers. `adapter_info` and SQLite's own `sqlite_`
/// namespace are reserved.
pub fn validate_table_name(name: &str) -> StorageResult<()> {
    if !TABLE_NAME.is_match(name) {
        return Err(ValidationError::new(format!("invalid table name '{name}'")).into());
    }
    let lower = name.to_ascii_lowercase();
    if lower == ADAPTER_INFO_TABLE || lower.starts_with("sqlite_") {
        return Err(ValidationError::new(format!("table name '{name}' is reserved")).into());
    }
    Ok(())
}

/// Escape `*`, `?` and `[` so `s` matches literally inside a GLOB pattern.
pub(crate) fn escape_glob(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '*' => escaped.push_str("[*]"),
            '?' => escaped.push_str("[?]"),
            '[' => escaped.push_str("[[]"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// SQLite-backed CRDT storage.
///
/// # Thread Safety
///
/// The connection is wrapped in a `Mutex` for thread-safe access.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteStorage {
    /// Open or create a SQLite database at the given path using the default table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, if schema
    /// initialization fails, or if the database was written by a different
    /// schema version.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::open_with_table(path, DEFAULT_TABLE)
    }

    /// Open or create a SQLite database storing chunks in `table`.
    pub fn open_with_table<P: AsRef<Path>>(path: P, table: &str) -> StorageResult<Self> {
        validate_table_name(table)?;
        let conn = Connection::open(path)?;
        Self::from_connection(conn, table)
    }

    /// Create an in-memory SQLite database for testing.
    pub fn in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, DEFAULT_TABLE)
    }

    fn from_connection(conn: Connection, table: &str) -> StorageResult<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// The table chunks are stored in.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The table name quoted for use in SQL.
    fn ident(&self) -> String {
        format!("\"{}\"", self.table)
    }

    /// Initialize the schema and check the recorded adapter version.
    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS adapter_info (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version_control_system TEXT NOT NULL,
                schema_version INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                last_migrated_at INTEGER NOT NULL
            );
            "#,
            table = self.ident()
        ))?;

        let recorded: Option<(String, i64)> = conn
            .query_row(
                "SELECT version_control_system, schema_version FROM adapter_info WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match recorded {
            None => {
                let now = chrono::Utc::now().timestamp_millis();
                conn.execute(
                    "INSERT INTO adapter_info (id, version_control_system, schema_version, created_at, last_migrated_at)
                     VALUES (1, ?, ?, ?, ?)",
                    params![VERSION_CONTROL_SYSTEM, SCHEMA_VERSION, now, now],
                )?;
                log::debug!(
                    "Initialized storage schema v{} ({})",
                    SCHEMA_VERSION,
                    VERSION_CONTROL_SYSTEM
                );
                Ok(())
            }
            Some((vcs, version)) if vcs == VERSION_CONTROL_SYSTEM && version == SCHEMA_VERSION => {
                Ok(())
            }
            Some((vcs, version)) => Err(MigrationError::new(format!(
                "database was written by {vcs} schema v{version}, this build expects \
                 {VERSION_CONTROL_SYSTEM} schema v{SCHEMA_VERSION}; manual migration required"
            ))
            .into()),
        }
    }
}

impl CrdtStorage for SqliteStorage {
    fn load(&self, key: &[&str]) -> StorageResult<Option<Vec<u8>>> {
        let key = join_key(key)?;
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?", self.ident()),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&self, key: &[&str], value: &[u8]) -> StorageResult<()> {
        let key = join_key(key)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                self.ident()
            ),
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &[&str]) -> StorageResult<()> {
        let key = join_key(key)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("DELETE FROM {} WHERE key = ?", self.ident()),
            params![key],
        )?;
        Ok(())
    }

    fn load_range(&self, prefix: &[&str]) -> StorageResult<Vec<StorageEntry>> {
        let prefix = join_prefix(prefix)?;
        let conn = self.conn.lock().unwrap();

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, Vec<u8>)> {
            Ok((row.get(0)?, row.get(1)?))
        };
        let rows = if prefix.is_empty() {
            let mut stmt = conn.prepare(&format!(
                "SELECT key, value FROM {} ORDER BY key",
                self.ident()
            ))?;
            let rows: Vec<(String, Vec<u8>)> = stmt
                .query_map([], map_row)?
                .collect::<rusqlite::Result<_>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT key, value FROM {} WHERE key = ? OR key GLOB ? ORDER BY key",
                self.ident()
            ))?;
            let pattern = format!("{}/*", escape_glob(&prefix));
            let rows: Vec<(String, Vec<u8>)> = stmt
                .query_map(params![prefix, pattern], map_row)?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };

        Ok(rows
            .into_iter()
            .map(|(key, value)| StorageEntry {
                key: split_key(&key),
                value,
            })
            .collect())
    }

    fn remove_range(&self, prefix: &[&str]) -> StorageResult<()> {
        let prefix = join_prefix(prefix)?;
        let conn = self.conn.lock().unwrap();
        if prefix.is_empty() {
            conn.execute(&format!("DELETE FROM {}", self.ident()), [])?;
        } else {
            let pattern = format!("{}/*", escape_glob(&prefix));
            conn.execute(
                &format!("DELETE FROM {} WHERE key = ? OR key GLOB ?", self.ident()),
                params![prefix, pattern],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_sqlite_save_and_load() {
        let storage = SqliteStorage::in_memory().unwrap();
        storage.save(&["doc", "state"], b"one").unwrap();
        storage.save(&["doc", "state"], b"two").unwrap();
        assert_eq!(
            storage.load(&["doc", "state"]).unwrap(),
            Some(b"two".to_vec())
        );
        assert!(storage.load(&["missing"]).unwrap().is_none());
    }

    #[test]
    fn test_sqlite_range_escapes_glob_metacharacters() {
        let storage = SqliteStorage::in_memory().unwrap();
        storage.save(&["a*", "x"], b"1").unwrap();
        storage.save(&["ab", "y"], b"2").unwrap();
        storage.save(&["a[", "z"], b"3").unwrap();
        storage.save(&["a?", "w"], b"4").unwrap();

        let range = storage.load_range(&["a*"]).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range[0].key, vec!["a*", "x"]);

        assert_eq!(storage.load_range(&["a["]).unwrap().len(), 1);
        assert_eq!(storage.load_range(&["a?"]).unwrap().len(), 1);
        assert_eq!(storage.load_range(&[]).unwrap().len(), 4);

        storage.remove_range(&["a?"]).unwrap();
        assert_eq!(storage.load_range(&[]).unwrap().len(), 3);
        assert!(storage.load(&["ab", "y"]).unwrap().is_some());
    }

    #[test]
    fn test_sqlite_rejects_bad_table_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        for table in ["", "1abc", "x; DROP TABLE y", "a-b"] {
            assert!(matches!(
                SqliteStorage::open_with_table(&path, table),
                Err(StorageError::Validation(_))
            ));
        }
        assert!(SqliteStorage::open_with_table(&path, "_chunks_2").is_ok());
    }

    #[test]
    fn test_sqlite_reserved_table_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        for table in ["adapter_info", "Adapter_Info", "sqlite_master", "SQLITE_chunks"] {
            let err = SqliteStorage::open_with_table(&path, table).err().unwrap();
            assert!(matches!(err, StorageError::Validation(_)), "{table}");
            assert!(err.to_string().contains("reserved"));
        }
    }

    #[test]
    fn test_sqlite_keyword_table_name_is_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            SqliteStorage::open_with_table(dir.path().join("db.sqlite"), "select").unwrap();
        storage.save(&["doc", "state"], b"v").unwrap();
        assert_eq!(storage.load(&["doc", "state"]).unwrap(), Some(b"v".to_vec()));
        assert_eq!(storage.load_range(&["doc"]).unwrap().len(), 1);
        storage.remove_range(&["doc"]).unwrap();
        assert!(storage.load_range(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_reopen_checks_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.save(&["k"], b"v").unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        assert_eq!(storage.load(&["k"]).unwrap(), Some(b"v".to_vec()));
        drop(storage);

        let conn = Connection::open(&path).unwrap();
        conn.execute("UPDATE adapter_info SET schema_version = 99", [])
            .unwrap();
        drop(conn);

        let err = SqliteStorage::open(&path).err().unwrap();
        assert!(matches!(err, StorageError::Migration(_)));
        assert!(err.to_string().contains("manual migration required"));
    }
}
