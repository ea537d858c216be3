//! Command-line argument structures and enums

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vellum")]
#[command(version)]
#[command(about = "Keep a directory of text files in sync with a versioned project", long_about = None)]
pub struct Cli {
    /// Override the database location from the config file
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a project from the files in a directory
    Import {
        /// Directory to import
        dir: PathBuf,
    },

    /// Bring a project up to date with its directory
    Sync {
        /// Project id
        project: String,

        /// Directory the project mirrors
        dir: PathBuf,

        /// Cap on concurrent operations (defaults to the config value)
        #[arg(short = 'j', long)]
        jobs: Option<usize>,
    },

    /// List the documents of a project
    #[command(alias = "list")]
    Ls {
        /// Project id
        project: String,
    },

    /// Show the commit history of a document
    #[command(alias = "log")]
    History {
        /// Document id (`vellum:<uuid>` or a bare uuid)
        document: String,
    },

    /// Commit a document's pending changes
    Commit {
        /// Document id (`vellum:<uuid>` or a bare uuid)
        document: String,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_with_global_flags() {
        let cli = Cli::try_parse_from([
            "vellum", "sync", "proj-id", "notes", "-j", "4", "--json", "--database", "v.db",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.database, Some(PathBuf::from("v.db")));
        match cli.command {
            Commands::Sync { project, dir, jobs } => {
                assert_eq!(project, "proj-id");
                assert_eq!(dir, PathBuf::from("notes"));
                assert_eq!(jobs, Some(4));
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_commit_requires_message() {
        assert!(Cli::try_parse_from(["vellum", "commit", "vellum:abc"]).is_err());
        let cli = Cli::try_parse_from(["vellum", "commit", "vellum:abc", "-m", "Edit"]).unwrap();
        assert!(matches!(cli.command, Commands::Commit { message, .. } if message == "Edit"));
    }
}
