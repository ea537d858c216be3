//! Project reconciliation.
//!
//! [`ProjectReconciler`] computes the create/update/delete actions that bring
//! a project in line with its directory and applies them in two bounded
//! batches: one for files on disk, one for documents whose file is gone.

mod concurrency;
mod reconciler;

pub use concurrency::{AbortHandle, MAX_CONCURRENT_OPERATIONS, try_map_bounded};
pub use reconciler::{DEFAULT_EXTENSIONS, ProjectReconciler, ReconcileReport};
