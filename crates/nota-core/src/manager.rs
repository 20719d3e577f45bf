//! Storage orchestration
//!
//! `StorageManager` composes document-store operations into the note,
//! folder, and tag mutations the application exposes. Every successful
//! mutation returns the `StorageEvent` the index must consume, alongside
//! the written value where there is one.
//!
//! Failures are typed (`crate::storage::StorageError`) and surface as-is;
//! nothing is retried here. Retry policy, if any, belongs to the caller.
//!
//! The multi-document sequences (folder delete, folder rename, tag rename,
//! tag delete) run inside a single store transaction, so a crash mid-way
//! leaves no half-renamed state behind.

use chrono::Utc;
use serde_json::json;
use tracing::debug;

use crate::docid::{self, DEFAULT_FOLDER};
use crate::events::StorageEvent;
use crate::models::{self, Folder, Note, NoteDraft, NoteMeta, NotePatch};
use crate::registry::RepositoryRegistry;
use crate::storage::{DocumentStore, StorageError, StorageResult};

/// Attempts before giving up on random note-ID generation
const MAX_ID_ATTEMPTS: u32 = 8;

/// Note, folder, and tag CRUD over the repository registry
pub struct StorageManager {
    registry: RepositoryRegistry,
}

impl StorageManager {
    pub fn new(registry: RepositoryRegistry) -> Self {
        Self { registry }
    }

    /// Access the underlying registry
    pub fn registry_mut(&mut self) -> &mut RepositoryRegistry {
        &mut self.registry
    }

    /// Create or refresh a folder document
    ///
    /// Idempotent: calling twice is not an error, the second call only
    /// bumps the revision.
    pub fn upsert_folder(
        &mut self,
        repository: &str,
        path: &str,
    ) -> StorageResult<(Folder, StorageEvent)> {
        validate_folder_path(path)?;

        let store = self.registry.get_mut(repository)?;
        let id = docid::folder_id(path);
        let expected = current_rev(store, &id)?;
        let doc = store.put(&id, json!({}), expected.as_deref())?;

        debug!(repository, path, rev = %doc.rev, "folder upserted");
        let folder = Folder {
            path: path.to_string(),
            rev: Some(doc.rev),
        };
        Ok((
            folder.clone(),
            StorageEvent::UpdateFolder {
                repository: repository.to_string(),
                folder,
            },
        ))
    }

    /// Delete a folder and every note it contains
    ///
    /// The folder document is tombstoned and the contained note documents
    /// are deleted in the same transaction, so the store never holds
    /// orphaned notes for a folder that is gone.
    pub fn delete_folder(&mut self, repository: &str, path: &str) -> StorageResult<StorageEvent> {
        validate_folder_path(path)?;
        if path == DEFAULT_FOLDER {
            return Err(StorageError::ProtectedFolder {
                path: path.to_string(),
            });
        }

        let store = self.registry.get_mut(repository)?;
        let folder_doc_id = docid::folder_id(path);

        store.transaction(|tx| {
            for doc in tx.list_all()? {
                if !docid::is_note_id(&doc.id) {
                    continue;
                }
                let note = Note::from_document(&doc)?;
                if note.folder == path {
                    tx.delete(&doc.id, &doc.rev)?;
                }
            }
            match tx.get(&folder_doc_id) {
                Ok(doc) => tx.delete(&folder_doc_id, &doc.rev),
                // The folder may exist only implicitly, through its notes
                Err(StorageError::NotFound { .. }) => Ok(()),
                Err(e) => Err(e),
            }
        })?;

        debug!(repository, path, "folder deleted");
        Ok(StorageEvent::DeleteFolder {
            repository: repository.to_string(),
            path: path.to_string(),
        })
    }

    /// Create a note
    ///
    /// The folder defaults to [`DEFAULT_FOLDER`]; title and preview default
    /// to the derived preview of the content.
    pub fn create_note(
        &mut self,
        repository: &str,
        draft: NoteDraft,
    ) -> StorageResult<(Note, StorageEvent)> {
        let folder = match draft.folder {
            Some(path) => {
                validate_folder_path(&path)?;
                path
            }
            None => DEFAULT_FOLDER.to_string(),
        };

        let store = self.registry.get_mut(repository)?;
        let id = free_note_id(store)?;
        let now = Utc::now();
        let preview = models::derive_preview(&draft.content);
        let title = draft.title.unwrap_or_else(|| preview.clone());

        let mut note = Note {
            id: id.clone(),
            rev: String::new(),
            meta: NoteMeta { title, preview },
            content: draft.content,
            tags: models::normalize_tags(draft.tags),
            folder,
            created_at: now,
            updated_at: now,
        };

        let doc = store.put(&id, note.to_body(), None)?;
        note.rev = doc.rev;

        debug!(repository, id = %note.id, folder = %note.folder, "note created");
        Ok((
            note.clone(),
            StorageEvent::CreateNote {
                repository: repository.to_string(),
                note,
            },
        ))
    }

    /// Apply a partial update to a note
    ///
    /// Reads the current document, merges the patch over it, and writes
    /// back guarded by the revision just read; a concurrent writer makes
    /// the write fail with `Conflict`.
    pub fn update_note(
        &mut self,
        repository: &str,
        id: &str,
        patch: NotePatch,
    ) -> StorageResult<(Note, StorageEvent)> {
        if let Some(path) = &patch.folder {
            validate_folder_path(path)?;
        }

        let store = self.registry.get_mut(repository)?;
        let doc = store.get(id)?;
        let mut note = Note::from_document(&doc)?;

        apply_patch(&mut note, patch);
        note.updated_at = Utc::now();

        let written = store.put(id, note.to_body(), Some(&note.rev))?;
        note.rev = written.rev;

        debug!(repository, id, "note updated");
        Ok((
            note.clone(),
            StorageEvent::UpdateNote {
                repository: repository.to_string(),
                note,
            },
        ))
    }

    /// Delete a note
    pub fn delete_note(&mut self, repository: &str, id: &str) -> StorageResult<StorageEvent> {
        let store = self.registry.get_mut(repository)?;
        let doc = store.get(id)?;
        store.delete(id, &doc.rev)?;

        debug!(repository, id, "note deleted");
        Ok(StorageEvent::DeleteNote {
            repository: repository.to_string(),
            id: id.to_string(),
        })
    }

    /// Rename a folder, carrying its notes along
    ///
    /// One transaction: every contained note is re-pointed at the new
    /// path, the new folder document is written, the old one tombstoned.
    pub fn rename_folder(
        &mut self,
        repository: &str,
        old_path: &str,
        new_path: &str,
    ) -> StorageResult<StorageEvent> {
        validate_folder_path(old_path)?;
        validate_folder_path(new_path)?;
        if old_path == DEFAULT_FOLDER {
            return Err(StorageError::ProtectedFolder {
                path: old_path.to_string(),
            });
        }
        if old_path == new_path {
            // Nothing to move; behave like an upsert
            let (_, event) = self.upsert_folder(repository, new_path)?;
            return Ok(event);
        }

        let store = self.registry.get_mut(repository)?;
        let old_doc_id = docid::folder_id(old_path);
        let new_doc_id = docid::folder_id(new_path);

        let folder = store.transaction(|tx| {
            let now = Utc::now();
            for doc in tx.list_all()? {
                if !docid::is_note_id(&doc.id) {
                    continue;
                }
                let mut note = Note::from_document(&doc)?;
                if note.folder == old_path {
                    note.folder = new_path.to_string();
                    note.updated_at = now;
                    tx.put(&doc.id, note.to_body(), Some(&doc.rev))?;
                }
            }

            let expected = match tx.get(&new_doc_id) {
                Ok(doc) => Some(doc.rev),
                Err(StorageError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            };
            let new_doc = tx.put(&new_doc_id, json!({}), expected.as_deref())?;

            match tx.get(&old_doc_id) {
                Ok(doc) => tx.delete(&old_doc_id, &doc.rev)?,
                Err(StorageError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }

            Ok(Folder {
                path: new_path.to_string(),
                rev: Some(new_doc.rev),
            })
        })?;

        debug!(repository, from = old_path, to = new_path, "folder renamed");
        Ok(StorageEvent::MoveFolder {
            repository: repository.to_string(),
            from: old_path.to_string(),
            to: folder,
        })
    }

    /// Rename a tag on every note carrying it
    pub fn rename_tag(
        &mut self,
        repository: &str,
        old_tag: &str,
        new_tag: &str,
    ) -> StorageResult<StorageEvent> {
        validate_tag(old_tag)?;
        validate_tag(new_tag)?;
        if old_tag == new_tag {
            return Ok(StorageEvent::UpdateTag {
                repository: repository.to_string(),
                tag: new_tag.to_string(),
            });
        }

        let store = self.registry.get_mut(repository)?;
        rewrite_tagged_notes(store, old_tag, |note| {
            note.tags.retain(|t| t != old_tag && t != new_tag);
            note.tags.push(new_tag.to_string());
        })?;

        debug!(repository, from = old_tag, to = new_tag, "tag renamed");
        Ok(StorageEvent::RenameTag {
            repository: repository.to_string(),
            from: old_tag.to_string(),
            to: new_tag.to_string(),
        })
    }

    /// Remove a tag from every note carrying it
    pub fn delete_tag(&mut self, repository: &str, tag: &str) -> StorageResult<StorageEvent> {
        validate_tag(tag)?;

        let store = self.registry.get_mut(repository)?;
        rewrite_tagged_notes(store, tag, |note| {
            note.tags.retain(|t| t != tag);
        })?;

        debug!(repository, tag, "tag deleted");
        Ok(StorageEvent::DeleteTag {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Snapshot every repository for a full index (re)build
    pub fn load_all(&mut self) -> StorageResult<StorageEvent> {
        let snapshot = self.registry.load_all()?;
        Ok(StorageEvent::LoadAll { snapshot })
    }
}

/// Read the current revision of a document, `None` when it is missing
fn current_rev(store: &DocumentStore, id: &str) -> StorageResult<Option<String>> {
    match store.get(id) {
        Ok(doc) => Ok(Some(doc.rev)),
        Err(StorageError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Rewrite every note carrying `tag` inside one transaction
fn rewrite_tagged_notes(
    store: &mut DocumentStore,
    tag: &str,
    rewrite: impl Fn(&mut Note),
) -> StorageResult<()> {
    store.transaction(|tx| {
        let now = Utc::now();
        for doc in tx.list_all()? {
            if !docid::is_note_id(&doc.id) {
                continue;
            }
            let mut note = Note::from_document(&doc)?;
            if note.has_tag(tag) {
                rewrite(&mut note);
                note.updated_at = now;
                tx.put(&doc.id, note.to_body(), Some(&doc.rev))?;
            }
        }
        Ok(())
    })
}

/// Merge a patch over a note; `None` fields keep their previous value
fn apply_patch(note: &mut Note, patch: NotePatch) {
    if let Some(content) = patch.content {
        note.meta.preview = models::derive_preview(&content);
        note.content = content;
    }
    if let Some(title) = patch.title {
        note.meta.title = title;
    }
    // An explicit preview wins over the derived one
    if let Some(preview) = patch.preview {
        note.meta.preview = preview;
    }
    if let Some(tags) = patch.tags {
        note.tags = models::normalize_tags(tags);
    }
    if let Some(folder) = patch.folder {
        note.folder = folder;
    }
}

/// Pick a note ID no existing document uses
///
/// Collisions are effectively impossible, but the loop is bounded anyway:
/// a pathological generator fails with `IdGenerationFailed` instead of
/// spinning forever.
fn free_note_id(store: &DocumentStore) -> StorageResult<String> {
    generate_note_id(|id| match store.get(id) {
        Ok(_) => Ok(true),
        Err(StorageError::NotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    })
}

fn generate_note_id(mut exists: impl FnMut(&str) -> StorageResult<bool>) -> StorageResult<String> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = docid::new_note_id();
        if !exists(&id)? {
            return Ok(id);
        }
    }
    Err(StorageError::IdGenerationFailed {
        attempts: MAX_ID_ATTEMPTS,
    })
}

fn validate_folder_path(path: &str) -> StorageResult<()> {
    if docid::is_valid_folder_path(path) {
        Ok(())
    } else {
        Err(StorageError::InvalidPath {
            path: path.to_string(),
        })
    }
}

fn validate_tag(tag: &str) -> StorageResult<()> {
    if tag.is_empty() {
        Err(StorageError::InvalidTag {
            tag: tag.to_string(),
        })
    } else {
        Ok(())
    }
}
