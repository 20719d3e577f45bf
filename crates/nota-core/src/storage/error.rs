//! Storage error handling
//!
//! Typed errors for every storage operation. Nothing here is retried or
//! swallowed; callers decide what a `Conflict` or `NotFound` means to them.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Requested document does not exist (tombstoned documents count as
    /// missing)
    #[error("Document not found: '{id}'")]
    NotFound { id: String },

    /// Revision mismatch on a guarded write; the caller holds a stale
    /// revision and must re-read before retrying
    #[error("Revision conflict on '{id}': the provided revision is stale")]
    Conflict { id: String },

    /// Failed to create a directory
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Stored document body cannot be parsed
    #[error("Document '{id}' has an invalid body: {details}")]
    InvalidDocument { id: String, details: String },

    /// Folder path is not `/`-prefixed or names no segment
    #[error("Invalid folder path '{path}': paths must start with '/' and name a folder")]
    InvalidPath { path: String },

    /// The default folder cannot be deleted or renamed
    #[error("Folder '{path}' is protected and cannot be deleted or renamed")]
    ProtectedFolder { path: String },

    /// Tag names must be non-empty
    #[error("Invalid tag name: '{tag}'")]
    InvalidTag { tag: String },

    /// No repository registered under this name
    #[error("Unknown repository: '{name}'")]
    UnknownRepository { name: String },

    /// Repository names are single path segments of word characters
    #[error("Invalid repository name: '{name}'")]
    InvalidRepositoryName { name: String },

    /// Random ID generation kept colliding with existing documents
    #[error("Failed to generate a unique note ID after {attempts} attempts")]
    IdGenerationFailed { attempts: u32 },

    /// The in-memory index disagrees with itself or with the stores
    #[error("Index invariant violated: {details}")]
    InvariantViolation { details: String },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            _ if is_disk_full_error(&error) => StorageError::DiskFull {
                path,
                source: error,
            },
            _ => StorageError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Check whether this is a revision conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }

    /// Check whether this is a missing-document error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Check if an I/O error indicates a disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
