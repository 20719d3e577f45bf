//! Document ID conventions
//!
//! Every document in a repository store is keyed by a prefixed string ID:
//!
//! - Notes: `note:<32 lowercase hex>`
//! - Folders: `folder:<path>` where the path always starts with `/`
//!
//! These conventions are preserved bit-exact so existing stores stay
//! readable across versions.

use uuid::Uuid;

/// Prefix for note document IDs
pub const NOTE_PREFIX: &str = "note:";

/// Prefix for folder document IDs
pub const FOLDER_PREFIX: &str = "folder:";

/// Path of the default folder present in every repository
///
/// This folder always exists in the index and cannot be deleted or renamed.
pub const DEFAULT_FOLDER: &str = "/Notes";

/// Generate a candidate note document ID
///
/// Uniqueness is checked against the store by the caller; candidates are
/// random, not sequential.
pub fn new_note_id() -> String {
    format!("{}{}", NOTE_PREFIX, Uuid::new_v4().simple())
}

/// Build the document ID for a folder path
pub fn folder_id(path: &str) -> String {
    format!("{}{}", FOLDER_PREFIX, path)
}

/// Check whether a document ID names a note
pub fn is_note_id(id: &str) -> bool {
    id.starts_with(NOTE_PREFIX)
}

/// Check whether a document ID names a folder
pub fn is_folder_id(id: &str) -> bool {
    id.starts_with(FOLDER_PREFIX)
}

/// Extract the folder path from a `folder:` document ID
pub fn folder_path(id: &str) -> Option<&str> {
    id.strip_prefix(FOLDER_PREFIX)
}

/// Check that a folder path is well-formed
///
/// Paths are `/`-prefixed and name at least one segment.
pub fn is_valid_folder_path(path: &str) -> bool {
    path.len() > 1 && path.starts_with('/') && !path.ends_with('/')
}
