//! Document command handlers

use chrono::{DateTime, Local};
use vellum_core::crdt::{Change, get_history};
use vellum_core::ids::{DocumentId, url_encode_commit_id};
use vellum_core::store::VersionedDocumentStore;

use crate::cli::{CliError, Session, block_on};

fn format_time(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn format_change(change: &Change) -> String {
    let id = match change.id().as_heads().and_then(|heads| heads.iter().next()) {
        Some(hash) => hash.to_string(),
        None => url_encode_commit_id(change.id()),
    };
    let short: String = id.chars().take(12).collect();
    let message = change.message().unwrap_or("(uncommitted)");
    format!("{short}  {}  {message}", format_time(change.time()))
}

/// Print the derived history of a document, newest first.
pub fn handle_history(session: &Session, document: &str, json: bool) -> Result<(), CliError> {
    let id: DocumentId = document.parse()?;
    let handle = block_on(session.documents.find_document_handle_by_id(id))?;
    let history = get_history(&handle)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    println!("{} ({})", history.current.title, id);
    if history.history.is_empty() {
        println!("  no changes");
    }
    for change in &history.history {
        println!("  {}", format_change(change));
    }
    Ok(())
}

/// Commit whatever the document has accumulated since its last commit.
pub fn handle_commit(session: &Session, document: &str, message: &str) -> Result<(), CliError> {
    let id: DocumentId = document.parse()?;
    match block_on(session.documents.commit_changes(id, message))? {
        Some(hash) => println!("✓ Committed {} as {}", id, hash),
        None => println!("Nothing to commit for {}", id),
    }
    Ok(())
}
