/// Clap argument definitions
mod args;

/// `commit` and `history` commands
mod document;

/// `import`, `sync` and `ls` commands
mod project;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;

use vellum_core::config::Config;
use vellum_core::crdt::{CrdtStorage, SqliteStorage};
use vellum_core::error::{
    Classified, ConfigError, ErrorKind, ReconcileError, StorageError, StoreError, ValidationError,
};
use vellum_core::fs::{FileSystem, RealFileSystem, SyncToAsyncFs};
use vellum_core::reconcile::ProjectReconciler;
use vellum_core::store::{CrdtDocumentStore, CrdtProjectStore};

pub use args::Cli;
use args::Commands;

/// Type alias for the async filesystem used throughout the CLI.
pub type AsyncFs = SyncToAsyncFs<RealFileSystem>;

/// Helper to run async operations in sync context
fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures_lite::future::block_on(f)
}

/// Anything a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("could not create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Classified for CliError {
    fn kind(&self) -> ErrorKind {
        match self {
            CliError::Config(_) | CliError::Io { .. } | CliError::Json(_) => ErrorKind::Repository,
            CliError::Storage(e) => e.kind(),
            CliError::Store(e) => e.kind(),
            CliError::Reconcile(e) => e.kind(),
            CliError::Validation(_) => ErrorKind::Validation,
        }
    }
}

/// Stores and reconciler opened against the configured database.
pub struct Session {
    pub config: Config,
    pub documents: Arc<CrdtDocumentStore>,
    pub projects: Arc<CrdtProjectStore>,
}

impl Session {
    /// Load the config and open the database it names.
    pub fn open(database_override: Option<PathBuf>) -> Result<Self, CliError> {
        let mut config = Config::load()?;
        if let Some(database) = database_override {
            config.database_path = database;
        }

        if let Some(parent) = config.database_path.parent()
            && !parent.as_os_str().is_empty()
        {
            RealFileSystem
                .create_dir_all(parent)
                .map_err(|source| CliError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let storage: Arc<dyn CrdtStorage> = Arc::new(SqliteStorage::open_with_table(
            &config.database_path,
            &config.storage_table,
        )?);
        log::debug!("Opened {}", config.database_path.display());

        Ok(Self {
            documents: Arc::new(CrdtDocumentStore::new(Arc::clone(&storage))),
            projects: Arc::new(CrdtProjectStore::new(storage)),
            config,
        })
    }

    /// A reconciler over the real filesystem, tuned by the config.
    pub fn reconciler(&self) -> ProjectReconciler {
        let fs: AsyncFs = SyncToAsyncFs::new(RealFileSystem);
        ProjectReconciler::new(Arc::new(fs), self.documents.clone(), self.projects.clone())
            .with_config(&self.config)
    }
}

/// Main entry point for the CLI
pub fn run_cli() {
    let cli = Cli::parse();

    let result = Session::open(cli.database).and_then(|session| match cli.command {
        Commands::Import { dir } => project::handle_import(&session, &dir, cli.json),

        Commands::Sync { project, dir, jobs } => {
            project::handle_sync(&session, &project, &dir, jobs, cli.json)
        }

        Commands::Ls { project } => project::handle_ls(&session, &project, cli.json),

        Commands::History { document } => {
            document::handle_history(&session, &document, cli.json)
        }

        Commands::Commit { document, message } => {
            document::handle_commit(&session, &document, &message)
        }
    });

    if let Err(e) = result {
        eprintln!("✗ {}", e);
        let code = match e.kind() {
            ErrorKind::NotFound => 2,
            ErrorKind::Validation => 3,
            _ => 1,
        };
        std::process::exit(code);
    }
}
