//! Project command handlers

use std::path::Path;

use vellum_core::reconcile::ReconcileReport;
use vellum_core::store::{MultiDocumentProjectStore, ProjectId};

use crate::cli::{CliError, Session, block_on};

/// Import `dir` as a new project and print its id.
pub fn handle_import(session: &Session, dir: &Path, json: bool) -> Result<(), CliError> {
    let project_id = block_on(session.reconciler().create_project_from_filesystem_content(dir))?;
    let documents = block_on(session.projects.list_project_documents(project_id))?;

    if json {
        let value = serde_json::json!({
            "projectId": project_id.to_string(),
            "documents": documents,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "✓ Imported {} file(s) from {}",
            documents.len(),
            dir.display()
        );
        println!("  project: {}", project_id);
    }
    Ok(())
}

/// Reconcile an existing project with `dir`.
pub fn handle_sync(
    session: &Session,
    project: &str,
    dir: &Path,
    jobs: Option<usize>,
    json: bool,
) -> Result<(), CliError> {
    let project_id: ProjectId = project.parse()?;
    let mut reconciler = session.reconciler();
    if let Some(jobs) = jobs {
        reconciler = reconciler.with_max_concurrent_operations(jobs);
    }

    let report = block_on(reconciler.update_project_from_filesystem_content(project_id, dir))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    if report.is_empty() {
        println!("✓ Already up to date");
        return;
    }
    for path in &report.created {
        println!("  + {}", path);
    }
    for path in &report.updated {
        println!("  ~ {}", path);
    }
    for path in &report.deleted {
        println!("  - {}", path);
    }
    for conflict in &report.conflicts {
        let reason = if conflict.is_modify_delete() {
            "modified on one side, removed on the other"
        } else {
            "added on both sides"
        };
        println!("  ! {} ({})", conflict.path(), reason);
    }
    println!(
        "✓ {} created, {} updated, {} deleted, {} conflict(s)",
        report.created.len(),
        report.updated.len(),
        report.deleted.len(),
        report.conflicts.len()
    );
}

/// List a project's documents.
pub fn handle_ls(session: &Session, project: &str, json: bool) -> Result<(), CliError> {
    let project_id: ProjectId = project.parse()?;
    let documents = block_on(session.projects.list_project_documents(project_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }
    if let Some(path) = session.projects.project_path(project_id)? {
        println!("{}", path);
    }
    for artifact in &documents {
        println!("  {}\t{}", artifact.id, artifact.path);
    }
    Ok(())
}
