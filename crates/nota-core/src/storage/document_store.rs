//! Revisioned key-value document store
//!
//! One SQLite database per repository. Documents are keyed by prefixed
//! string IDs (`note:<id>`, `folder:<path>`) and carry an opaque revision
//! that changes on every successful write. Deletes are tombstone writes:
//! the row stays, flagged, and is invisible to `get` and `list_all`.
//!
//! Isolation is per document. The only cross-document primitive is
//! [`DocumentStore::transaction`], which runs a closure against the same
//! operations and commits or rolls back as a unit.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::{init_schema, needs_init};

/// A stored document with its current revision
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Opaque revision token; required for guarded updates and deletes
    pub rev: String,
    pub body: Value,
}

/// Per-repository document database
#[derive(Debug)]
pub struct DocumentStore {
    conn: Connection,
    path: PathBuf,
}

impl DocumentStore {
    /// Open or create the store at the given path
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch a live document by ID
    pub fn get(&self, id: &str) -> StorageResult<Document> {
        get_doc(&self.conn, id)
    }

    /// Write a document, assigning a fresh revision
    ///
    /// With `expected_rev`, the write is guarded: a stale revision fails
    /// with [`StorageError::Conflict`]. Without it, the write always lands,
    /// replacing (or resurrecting) whatever is stored under the ID.
    pub fn put(&mut self, id: &str, body: Value, expected_rev: Option<&str>) -> StorageResult<Document> {
        put_doc(&self.conn, id, body, expected_rev)
    }

    /// Tombstone a document
    ///
    /// The revision must match the current one; afterwards the ID reads as
    /// missing but its history remains in the table.
    pub fn delete(&mut self, id: &str, rev: &str) -> StorageResult<()> {
        delete_doc(&self.conn, id, rev)
    }

    /// List every live document, ordered by ID
    pub fn list_all(&self) -> StorageResult<Vec<Document>> {
        list_docs(&self.conn)
    }

    /// Run several document operations as one atomic unit
    ///
    /// Commits when the closure returns `Ok`, rolls back otherwise.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut DocumentTx<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let tx = self.conn.transaction()?;
        let result = {
            // Transaction derefs to Connection, so the wrapper runs the
            // same operations the store itself uses
            let mut dtx = DocumentTx { conn: &tx };
            f(&mut dtx)
        };

        match result {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            // Dropping the transaction rolls it back
            Err(err) => Err(err),
        }
    }
}

/// Document operations scoped to an open transaction
pub struct DocumentTx<'a> {
    conn: &'a Connection,
}

impl DocumentTx<'_> {
    pub fn get(&self, id: &str) -> StorageResult<Document> {
        get_doc(self.conn, id)
    }

    pub fn put(&mut self, id: &str, body: Value, expected_rev: Option<&str>) -> StorageResult<Document> {
        put_doc(self.conn, id, body, expected_rev)
    }

    pub fn delete(&mut self, id: &str, rev: &str) -> StorageResult<()> {
        delete_doc(self.conn, id, rev)
    }

    pub fn list_all(&self) -> StorageResult<Vec<Document>> {
        list_docs(self.conn)
    }
}

/// Mint the revision for a write at the given generation
fn next_rev(generation: i64) -> String {
    format!("{}-{}", generation, Uuid::new_v4().simple())
}

fn get_doc(conn: &Connection, id: &str) -> StorageResult<Document> {
    let mut stmt = conn.prepare("SELECT rev, deleted, body FROM documents WHERE id = ?")?;
    let row = stmt
        .query_row(params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .optional()?;

    match row {
        Some((rev, false, body)) => {
            let body = serde_json::from_str(&body).map_err(|e| StorageError::InvalidDocument {
                id: id.to_string(),
                details: e.to_string(),
            })?;
            Ok(Document {
                id: id.to_string(),
                rev,
                body,
            })
        }
        _ => Err(StorageError::NotFound { id: id.to_string() }),
    }
}

fn put_doc(
    conn: &Connection,
    id: &str,
    body: Value,
    expected_rev: Option<&str>,
) -> StorageResult<Document> {
    let current: Option<(String, i64, bool)> = {
        let mut stmt = conn.prepare("SELECT rev, generation, deleted FROM documents WHERE id = ?")?;
        stmt.query_row(params![id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .optional()?
    };

    if let Some(expected) = expected_rev {
        match &current {
            Some((rev, _, false)) if rev == expected => {}
            _ => return Err(StorageError::Conflict { id: id.to_string() }),
        }
    }

    let generation = current.as_ref().map(|(_, g, _)| g + 1).unwrap_or(1);
    let rev = next_rev(generation);
    let body_text = body.to_string();

    conn.execute(
        "INSERT INTO documents (id, rev, generation, deleted, body) VALUES (?1, ?2, ?3, 0, ?4)
         ON CONFLICT(id) DO UPDATE SET rev = ?2, generation = ?3, deleted = 0, body = ?4",
        params![id, rev, generation, body_text],
    )?;

    Ok(Document {
        id: id.to_string(),
        rev,
        body,
    })
}

fn delete_doc(conn: &Connection, id: &str, rev: &str) -> StorageResult<()> {
    let current: Option<(String, bool)> = {
        let mut stmt = conn.prepare("SELECT rev, deleted FROM documents WHERE id = ?")?;
        stmt.query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?
    };

    match current {
        None | Some((_, true)) => Err(StorageError::NotFound { id: id.to_string() }),
        Some((current_rev, false)) if current_rev != rev => {
            Err(StorageError::Conflict { id: id.to_string() })
        }
        Some(_) => {
            conn.execute("UPDATE documents SET deleted = 1 WHERE id = ?", params![id])?;
            Ok(())
        }
    }
}

fn list_docs(conn: &Connection) -> StorageResult<Vec<Document>> {
    let mut stmt =
        conn.prepare("SELECT id, rev, body FROM documents WHERE deleted = 0 ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut docs = Vec::new();
    for row in rows {
        let (id, rev, body) = row?;
        let body = serde_json::from_str(&body).map_err(|e| StorageError::InvalidDocument {
            id: id.clone(),
            details: e.to_string(),
        })?;
        docs.push(Document { id, rev, body });
    }

    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_database_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("repo").join("store.db");

        DocumentStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_put_and_get_round_trip() {
        let mut store = DocumentStore::open_in_memory().unwrap();

        let body = json!({ "content": "hello", "folder": "/Notes" });
        let written = store.put("note:abc", body.clone(), None).unwrap();

        let read = store.get("note:abc").unwrap();
        assert_eq!(read.body, body);
        assert_eq!(read.rev, written.rev);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = DocumentStore::open_in_memory().unwrap();
        let err = store.get("note:missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_every_write_assigns_a_new_revision() {
        let mut store = DocumentStore::open_in_memory().unwrap();

        let first = store.put("note:abc", json!({ "v": 1 }), None).unwrap();
        let second = store
            .put("note:abc", json!({ "v": 2 }), Some(&first.rev))
            .unwrap();

        assert_ne!(first.rev, second.rev);
        assert!(second.rev.starts_with("2-"));
    }

    #[test]
    fn test_stale_revision_fails_with_conflict() {
        let mut store = DocumentStore::open_in_memory().unwrap();

        let first = store.put("note:abc", json!({ "v": 1 }), None).unwrap();
        store.put("note:abc", json!({ "v": 2 }), Some(&first.rev)).unwrap();

        // First revision is now stale
        let err = store
            .put("note:abc", json!({ "v": 3 }), Some(&first.rev))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_guarded_put_on_missing_document_conflicts() {
        let mut store = DocumentStore::open_in_memory().unwrap();
        let err = store
            .put("note:ghost", json!({}), Some("1-deadbeef"))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_unguarded_put_replaces_existing() {
        let mut store = DocumentStore::open_in_memory().unwrap();

        store.put("folder:/Notes", json!({}), None).unwrap();
        let second = store.put("folder:/Notes", json!({}), None).unwrap();

        assert!(second.rev.starts_with("2-"));
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_tombstones_the_document() {
        let mut store = DocumentStore::open_in_memory().unwrap();

        let doc = store.put("note:abc", json!({ "v": 1 }), None).unwrap();
        store.delete("note:abc", &doc.rev).unwrap();

        assert!(store.get("note:abc").unwrap_err().is_not_found());
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_delete_with_stale_revision_conflicts() {
        let mut store = DocumentStore::open_in_memory().unwrap();

        let first = store.put("note:abc", json!({ "v": 1 }), None).unwrap();
        store.put("note:abc", json!({ "v": 2 }), Some(&first.rev)).unwrap();

        let err = store.delete("note:abc", &first.rev).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let mut store = DocumentStore::open_in_memory().unwrap();
        let err = store.delete("note:missing", "1-x").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_put_resurrects_tombstoned_document() {
        let mut store = DocumentStore::open_in_memory().unwrap();

        let doc = store.put("note:abc", json!({ "v": 1 }), None).unwrap();
        store.delete("note:abc", &doc.rev).unwrap();

        let revived = store.put("note:abc", json!({ "v": 2 }), None).unwrap();
        assert!(revived.rev.starts_with("2-"));
        assert_eq!(store.get("note:abc").unwrap().body, json!({ "v": 2 }));
    }

    #[test]
    fn test_list_all_is_ordered_by_id() {
        let mut store = DocumentStore::open_in_memory().unwrap();

        store.put("note:bbb", json!({}), None).unwrap();
        store.put("folder:/Notes", json!({}), None).unwrap();
        store.put("note:aaa", json!({}), None).unwrap();

        let ids: Vec<String> = store.list_all().unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["folder:/Notes", "note:aaa", "note:bbb"]);
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let mut store = DocumentStore::open_in_memory().unwrap();

        store
            .transaction(|tx| {
                tx.put("note:one", json!({ "v": 1 }), None)?;
                tx.put("note:two", json!({ "v": 2 }), None)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(store.list_all().unwrap().len(), 2);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut store = DocumentStore::open_in_memory().unwrap();
        store.put("note:keep", json!({ "v": 1 }), None).unwrap();

        let result: StorageResult<()> = store.transaction(|tx| {
            tx.put("note:discard", json!({}), None)?;
            Err(StorageError::Conflict {
                id: "note:keep".to_string(),
            })
        });

        assert!(result.is_err());
        let ids: Vec<String> = store.list_all().unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["note:keep"]);
    }

    #[test]
    fn test_reopen_preserves_documents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.db");

        {
            let mut store = DocumentStore::open(&path).unwrap();
            store.put("note:abc", json!({ "v": 1 }), None).unwrap();
        }

        let store = DocumentStore::open(&path).unwrap();
        assert_eq!(store.get("note:abc").unwrap().body, json!({ "v": 1 }));
    }
}
