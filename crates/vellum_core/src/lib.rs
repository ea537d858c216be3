//! Versioned document and project synchronization engine.
//!
//! `vellum_core` keeps a directory of text files and a CRDT-versioned document
//! store in agreement. It provides:
//!
//! - [`ids`]: validated identifiers for documents, content references, branches
//!   and commits, plus their URL encodings.
//! - [`crdt`]: the change log, versioned documents, history derivation and the
//!   key/value storage adapters they persist through.
//! - [`store`]: the document store and project store ports with their CRDT-backed
//!   implementations.
//! - [`fs`]: the async filesystem abstraction the reconciler reads through.
//! - [`reconcile`]: the project reconciler.
//! - [`conflict`]: structural conflicts between a directory and its history.
//! - [`vfs`]: a POSIX-like virtual filesystem stored in SQLite.
//!
//! Library code logs through the `log` facade; binaries pick the backend.
#![warn(missing_docs)]

/// Configuration options
pub mod config;

/// Structural conflict model
pub mod conflict;

/// CRDT documents, history and storage
pub mod crdt;

/// Error (common error types)
pub mod error;

/// Filesystem abstraction
pub mod fs;

/// Identifier model
pub mod ids;

/// Project reconciliation
pub mod reconcile;

/// Document and project stores
pub mod store;

/// SQLite-backed virtual filesystem
#[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
pub mod vfs;

#[cfg(test)]
pub mod test_utils;
