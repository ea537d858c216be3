//! Configuration types for Vellum.
//!
//! [`Config`] holds where the document database lives and how reconciliation
//! behaves. It is persisted as TOML, typically at
//! `~/.config/vellum/config.toml` on Unix systems.
//!
//! # Example
//!
//! ```ignore
//! use vellum_core::config::Config;
//!
//! let config = Config::load()?;
//! let storage = SqliteStorage::open_with_table(&config.database_path, &config.storage_table)?;
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crdt::DEFAULT_TABLE;
use crate::error::{ConfigError, FsError};
use crate::fs::AsyncFileSystem;
use crate::reconcile::{DEFAULT_EXTENSIONS, MAX_CONCURRENT_OPERATIONS};

fn default_storage_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_max_concurrent_operations() -> usize {
    MAX_CONCURRENT_OPERATIONS
}

/// The parts of Vellum the user can configure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding documents and projects
    pub database_path: PathBuf,

    /// Table the CRDT key/value store uses inside the database
    #[serde(default = "default_storage_table")]
    pub storage_table: String,

    /// File extensions treated as project documents
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Cap on concurrent operations per reconciliation batch
    #[serde(default = "default_max_concurrent_operations")]
    pub max_concurrent_operations: usize,
}

impl Config {
    /// Create a config using the database at `database_path`.
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            database_path,
            storage_table: default_storage_table(),
            extensions: default_extensions(),
            max_concurrent_operations: default_max_concurrent_operations(),
        }
    }

    /// Load config from a specific path using an AsyncFileSystem.
    pub async fn load_from(fs: &dyn AsyncFileSystem, path: &Path) -> Result<Self, ConfigError> {
        let contents = fs
            .read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: FsError::from_io(path, e),
            })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path using an AsyncFileSystem.
    pub async fn save_to(&self, fs: &dyn AsyncFileSystem, path: &Path) -> Result<(), ConfigError> {
        let io_error = |e| ConfigError::Io {
            path: path.to_path_buf(),
            source: FsError::from_io(path, e),
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs.create_dir_all(parent).await.map_err(io_error)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs.write_file(path, &contents).await.map_err(io_error)?;
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(data_dir.join("vellum").join("vellum.db"))
    }
}

#[cfg(target_arch = "wasm32")]
impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("vellum.db"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Config {
    /// Get the config file path (~/.config/vellum/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vellum").join("config.toml"))
    }

    /// Load config from the default location, or the default if there is none.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => {
                let fs = crate::fs::SyncToAsyncFs::new(crate::fs::RealFileSystem);
                futures_lite::future::block_on(Self::load_from(&fs, &path))
            }
            _ => Ok(Self::default()),
        }
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        let fs = crate::fs::SyncToAsyncFs::new(crate::fs::RealFileSystem);
        futures_lite::future::block_on(self.save_to(&fs, &path))
    }
}
