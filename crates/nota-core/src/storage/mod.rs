//! Storage layer
//!
//! Revisioned document persistence for one repository.
//!
//! ## Architecture
//!
//! - One SQLite database per repository, one `documents` table
//! - Every successful write assigns a new opaque revision; guarded writes
//!   fail with `Conflict` on a stale revision
//! - Deletes are tombstones: invisible to reads, retained in the table
//!
//! The store is the source of truth; the in-memory index (`crate::index`)
//! is derived from it.

pub mod document_store;
pub mod error;
pub mod schema;

pub use document_store::{Document, DocumentStore, DocumentTx};
pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
