//! Derived in-memory index
//!
//! `StorageIndex` is the normalized view callers read from: per repository,
//! notes by ID plus folder and tag membership buckets. It is a cache
//! derived from the document stores, never a source of truth.
//!
//! [`reduce`] is a pure transition function: no I/O, no mutation of its
//! input. It returns a fresh snapshot, so readers holding the previous one
//! are unaffected. It is also total: events referencing unknown
//! repositories or notes are no-ops rather than errors, which keeps a
//! caller's view resilient to stray events.
//!
//! Membership invariants after every transition:
//!
//! - every note ID in a folder bucket belongs to a note whose `folder` is
//!   that path, and vice versa
//! - every note ID in a tag bucket belongs to a note carrying that tag,
//!   and vice versa
//! - a tag bucket exists only while referenced (tag upserts may create a
//!   transiently empty bucket; note-derived transitions drop empty ones)
//!
//! [`RepositoryIndex::verify`] checks these and reports
//! `InvariantViolation` on divergence.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::events::StorageEvent;
use crate::models::Note;
use crate::storage::{StorageError, StorageResult};

/// Folder membership bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FolderEntry {
    /// Revision of the folder document, `None` for implicit folders
    pub rev: Option<String>,
    /// IDs of notes whose `folder` is this path
    pub notes: BTreeSet<String>,
}

/// Tag membership bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagEntry {
    /// IDs of notes carrying this tag
    pub notes: BTreeSet<String>,
}

/// Index of one repository: notes plus folder and tag buckets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepositoryIndex {
    pub notes: BTreeMap<String, Note>,
    pub folders: BTreeMap<String, FolderEntry>,
    pub tags: BTreeMap<String, TagEntry>,
}

/// Index of every repository, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageIndex {
    pub repositories: BTreeMap<String, RepositoryIndex>,
}

impl RepositoryIndex {
    /// Look up a note by ID
    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.get(id)
    }

    /// Notes whose `folder` is the given path, in ID order
    pub fn notes_in_folder(&self, path: &str) -> Vec<&Note> {
        self.folders
            .get(path)
            .map(|entry| entry.notes.iter().filter_map(|id| self.notes.get(id)).collect())
            .unwrap_or_default()
    }

    /// Notes carrying the given tag, in ID order
    pub fn notes_with_tag(&self, tag: &str) -> Vec<&Note> {
        self.tags
            .get(tag)
            .map(|entry| entry.notes.iter().filter_map(|id| self.notes.get(id)).collect())
            .unwrap_or_default()
    }

    /// Every tag with its usage count, in name order
    pub fn tag_counts(&self) -> Vec<(String, usize)> {
        self.tags
            .iter()
            .map(|(name, entry)| (name.clone(), entry.notes.len()))
            .collect()
    }

    /// Check the membership invariants in both directions
    pub fn verify(&self) -> StorageResult<()> {
        for (path, entry) in &self.folders {
            for id in &entry.notes {
                match self.notes.get(id) {
                    Some(note) if note.folder == *path => {}
                    Some(note) => {
                        return Err(invariant(format!(
                            "folder '{}' lists note '{}' whose folder is '{}'",
                            path, id, note.folder
                        )))
                    }
                    None => {
                        return Err(invariant(format!(
                            "folder '{}' lists missing note '{}'",
                            path, id
                        )))
                    }
                }
            }
        }

        for (tag, entry) in &self.tags {
            for id in &entry.notes {
                match self.notes.get(id) {
                    Some(note) if note.has_tag(tag) => {}
                    Some(_) => {
                        return Err(invariant(format!(
                            "tag '{}' lists note '{}' which does not carry it",
                            tag, id
                        )))
                    }
                    None => {
                        return Err(invariant(format!(
                            "tag '{}' lists missing note '{}'",
                            tag, id
                        )))
                    }
                }
            }
        }

        for (id, note) in &self.notes {
            let in_folder = self
                .folders
                .get(&note.folder)
                .map(|entry| entry.notes.contains(id))
                .unwrap_or(false);
            if !in_folder {
                return Err(invariant(format!(
                    "note '{}' is missing from folder bucket '{}'",
                    id, note.folder
                )));
            }
            for tag in &note.tags {
                let in_tag = self
                    .tags
                    .get(tag)
                    .map(|entry| entry.notes.contains(id))
                    .unwrap_or(false);
                if !in_tag {
                    return Err(invariant(format!(
                        "note '{}' is missing from tag bucket '{}'",
                        id, tag
                    )));
                }
            }
        }

        Ok(())
    }
}

impl StorageIndex {
    /// Look up a repository's index by name
    pub fn repository(&self, name: &str) -> Option<&RepositoryIndex> {
        self.repositories.get(name)
    }

    /// Check the membership invariants of every repository
    pub fn verify(&self) -> StorageResult<()> {
        for repo in self.repositories.values() {
            repo.verify()?;
        }
        Ok(())
    }
}

fn invariant(details: String) -> StorageError {
    StorageError::InvariantViolation { details }
}

/// Apply one mutation event, producing the next index snapshot
///
/// Pure and total; the input snapshot is never aliased with the result.
pub fn reduce(index: &StorageIndex, event: &StorageEvent) -> StorageIndex {
    let mut next = index.clone();

    match event {
        StorageEvent::LoadAll { snapshot } => {
            next = StorageIndex::default();
            for (name, snap) in snapshot {
                let repo = next.repositories.entry(name.clone()).or_default();
                for folder in &snap.folders {
                    repo.folders.entry(folder.path.clone()).or_default().rev = folder.rev.clone();
                }
                for note in &snap.notes {
                    insert_note(repo, note.clone());
                }
            }
        }

        StorageEvent::CreateNote { repository, note } => {
            if let Some(repo) = next.repositories.get_mut(repository) {
                insert_note(repo, note.clone());
            }
        }

        StorageEvent::UpdateNote { repository, note } => {
            if let Some(repo) = next.repositories.get_mut(repository) {
                if let Some(old) = repo.notes.get(&note.id).cloned() {
                    unlink_note(repo, &old);
                    insert_note(repo, note.clone());
                }
            }
        }

        StorageEvent::DeleteNote { repository, id } => {
            if let Some(repo) = next.repositories.get_mut(repository) {
                if let Some(note) = repo.notes.get(id).cloned() {
                    unlink_note(repo, &note);
                    repo.notes.remove(id);
                }
            }
        }

        StorageEvent::UpdateFolder { repository, folder } => {
            if let Some(repo) = next.repositories.get_mut(repository) {
                repo.folders.entry(folder.path.clone()).or_default().rev = folder.rev.clone();
            }
        }

        StorageEvent::DeleteFolder { repository, path } => {
            if let Some(repo) = next.repositories.get_mut(repository) {
                if let Some(entry) = repo.folders.remove(path) {
                    for id in &entry.notes {
                        if let Some(note) = repo.notes.remove(id) {
                            for tag in &note.tags {
                                remove_tag_member(repo, tag, id);
                            }
                        }
                    }
                }
            }
        }

        StorageEvent::UpdateTag { repository, tag } => {
            if let Some(repo) = next.repositories.get_mut(repository) {
                repo.tags.entry(tag.clone()).or_default();
            }
        }

        StorageEvent::DeleteTag { repository, tag } => {
            if let Some(repo) = next.repositories.get_mut(repository) {
                if let Some(entry) = repo.tags.remove(tag) {
                    for id in &entry.notes {
                        if let Some(note) = repo.notes.get_mut(id) {
                            note.tags.retain(|t| t != tag);
                        }
                    }
                }
            }
        }

        StorageEvent::MoveFolder {
            repository,
            from,
            to,
        } => {
            if let Some(repo) = next.repositories.get_mut(repository) {
                if let Some(entry) = repo.folders.remove(from) {
                    for id in &entry.notes {
                        if let Some(note) = repo.notes.get_mut(id) {
                            note.folder = to.path.clone();
                        }
                    }
                    let target = repo.folders.entry(to.path.clone()).or_default();
                    target.rev = to.rev.clone();
                    target.notes.extend(entry.notes);
                }
            }
        }

        StorageEvent::RenameTag {
            repository,
            from,
            to,
        } => {
            if let Some(repo) = next.repositories.get_mut(repository) {
                if let Some(entry) = repo.tags.remove(from) {
                    for id in &entry.notes {
                        if let Some(note) = repo.notes.get_mut(id) {
                            note.tags.retain(|t| t != from && t != to);
                            note.tags.push(to.clone());
                        }
                    }
                    let target = repo.tags.entry(to.clone()).or_default();
                    target.notes.extend(entry.notes.iter().cloned());
                }
            }
        }
    }

    next
}

/// Insert a note and register its folder and tag membership
fn insert_note(repo: &mut RepositoryIndex, note: Note) {
    repo.folders
        .entry(note.folder.clone())
        .or_default()
        .notes
        .insert(note.id.clone());
    for tag in &note.tags {
        repo.tags
            .entry(tag.clone())
            .or_default()
            .notes
            .insert(note.id.clone());
    }
    repo.notes.insert(note.id.clone(), note);
}

/// Remove a note's folder and tag membership
///
/// Folder entries persist even when emptied (the folder still exists);
/// tag buckets exist only while referenced and are dropped when emptied.
fn unlink_note(repo: &mut RepositoryIndex, note: &Note) {
    if let Some(entry) = repo.folders.get_mut(&note.folder) {
        entry.notes.remove(&note.id);
    }
    for tag in &note.tags {
        remove_tag_member(repo, tag, &note.id);
    }
}

fn remove_tag_member(repo: &mut RepositoryIndex, tag: &str, id: &str) {
    if let Some(entry) = repo.tags.get_mut(tag) {
        entry.notes.remove(id);
        if entry.notes.is_empty() {
            repo.tags.remove(tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Folder, NoteMeta};
    use crate::registry::{RepositorySnapshot, StorageSnapshot};
    use chrono::Utc;

    const REPO: &str = "notebook";

    fn note(id: &str, folder: &str, tags: &[&str]) -> Note {
        let now = Utc::now();
        Note {
            id: format!("note:{}", id),
            rev: format!("1-{}", id),
            meta: NoteMeta {
                title: id.to_string(),
                preview: id.to_string(),
            },
            content: id.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            folder: folder.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn empty_index() -> StorageIndex {
        let mut snapshot = StorageSnapshot::new();
        snapshot.insert(
            REPO.to_string(),
            RepositorySnapshot {
                notes: Vec::new(),
                folders: vec![Folder {
                    path: "/Notes".to_string(),
                    rev: None,
                }],
            },
        );
        reduce(&StorageIndex::default(), &StorageEvent::LoadAll { snapshot })
    }

    fn create(index: &StorageIndex, n: Note) -> StorageIndex {
        reduce(
            index,
            &StorageEvent::CreateNote {
                repository: REPO.to_string(),
                note: n,
            },
        )
    }

    fn repo(index: &StorageIndex) -> &RepositoryIndex {
        index.repository(REPO).unwrap()
    }

    #[test]
    fn test_load_all_replaces_the_index() {
        let index = create(&empty_index(), note("stale", "/Notes", &[]));

        let mut snapshot = StorageSnapshot::new();
        snapshot.insert(
            REPO.to_string(),
            RepositorySnapshot {
                notes: vec![note("fresh", "/Notes", &["a"])],
                folders: vec![Folder {
                    path: "/Notes".to_string(),
                    rev: Some("3-abc".to_string()),
                }],
            },
        );

        let next = reduce(&index, &StorageEvent::LoadAll { snapshot });
        let repo = repo(&next);

        assert!(repo.note("note:stale").is_none());
        assert!(repo.note("note:fresh").is_some());
        assert_eq!(repo.folders["/Notes"].rev, Some("3-abc".to_string()));
        assert!(repo.tags.contains_key("a"));
        next.verify().unwrap();
    }

    #[test]
    fn test_create_note_registers_membership() {
        let index = create(&empty_index(), note("a", "/Notes", &["rust", "ideas"]));
        let repo = repo(&index);

        assert!(repo.folders["/Notes"].notes.contains("note:a"));
        assert!(repo.tags["rust"].notes.contains("note:a"));
        assert!(repo.tags["ideas"].notes.contains("note:a"));
        index.verify().unwrap();
    }

    #[test]
    fn test_create_note_materializes_implicit_folder() {
        let index = create(&empty_index(), note("a", "/Scratch", &[]));
        let repo = repo(&index);

        let entry = &repo.folders["/Scratch"];
        assert!(entry.rev.is_none());
        assert!(entry.notes.contains("note:a"));
    }

    #[test]
    fn test_update_note_moves_across_folder_buckets() {
        let index = create(&empty_index(), note("a", "/Notes", &[]));

        let mut moved = note("a", "/Archive", &[]);
        moved.rev = "2-a".to_string();
        let next = reduce(
            &index,
            &StorageEvent::UpdateNote {
                repository: REPO.to_string(),
                note: moved,
            },
        );
        let repo = repo(&next);

        // No residual membership in the old bucket
        assert!(!repo.folders["/Notes"].notes.contains("note:a"));
        assert!(repo.folders["/Archive"].notes.contains("note:a"));
        next.verify().unwrap();
    }

    #[test]
    fn test_update_note_diffs_tag_sets() {
        let index = create(&empty_index(), note("a", "/Notes", &["old", "kept"]));

        let next = reduce(
            &index,
            &StorageEvent::UpdateNote {
                repository: REPO.to_string(),
                note: note("a", "/Notes", &["kept", "new"]),
            },
        );
        let repo = repo(&next);

        assert!(!repo.tags.contains_key("old"));
        assert!(repo.tags["kept"].notes.contains("note:a"));
        assert!(repo.tags["new"].notes.contains("note:a"));
        next.verify().unwrap();
    }

    #[test]
    fn test_update_unknown_note_is_a_no_op() {
        let index = empty_index();
        let next = reduce(
            &index,
            &StorageEvent::UpdateNote {
                repository: REPO.to_string(),
                note: note("ghost", "/Notes", &[]),
            },
        );
        assert_eq!(next, index);
    }

    #[test]
    fn test_delete_note_cleans_folder_and_tag_buckets() {
        let index = create(&empty_index(), note("a", "/Notes", &["rust", "shared"]));
        let index = create(&index, note("b", "/Notes", &["shared"]));

        let next = reduce(
            &index,
            &StorageEvent::DeleteNote {
                repository: REPO.to_string(),
                id: "note:a".to_string(),
            },
        );
        let repo = repo(&next);

        assert!(repo.note("note:a").is_none());
        assert!(!repo.folders["/Notes"].notes.contains("note:a"));
        // The deleted note's ID never lingers in any tag bucket
        assert!(!repo.tags.contains_key("rust"));
        assert_eq!(
            repo.tags["shared"].notes,
            BTreeSet::from(["note:b".to_string()])
        );
        next.verify().unwrap();
    }

    #[test]
    fn test_delete_folder_cascades_to_contained_notes() {
        let index = create(&empty_index(), note("a", "/X", &["t"]));
        let index = create(&index, note("b", "/X", &[]));
        let index = create(&index, note("c", "/Y", &[]));

        let next = reduce(
            &index,
            &StorageEvent::DeleteFolder {
                repository: REPO.to_string(),
                path: "/X".to_string(),
            },
        );
        let repo = repo(&next);

        assert!(repo.note("note:a").is_none());
        assert!(repo.note("note:b").is_none());
        assert!(repo.note("note:c").is_some());
        assert!(!repo.folders.contains_key("/X"));
        assert!(repo.folders.contains_key("/Y"));
        // Tags of the removed notes leave no dangling references
        assert!(!repo.tags.contains_key("t"));
        next.verify().unwrap();
    }

    #[test]
    fn test_update_folder_touches_rev_only() {
        let index = create(&empty_index(), note("a", "/Work", &[]));

        let next = reduce(
            &index,
            &StorageEvent::UpdateFolder {
                repository: REPO.to_string(),
                folder: Folder {
                    path: "/Work".to_string(),
                    rev: Some("2-abc".to_string()),
                },
            },
        );
        let repo = repo(&next);

        assert_eq!(repo.folders["/Work"].rev, Some("2-abc".to_string()));
        assert!(repo.folders["/Work"].notes.contains("note:a"));
    }

    #[test]
    fn test_delete_tag_strips_it_from_notes() {
        let index = create(&empty_index(), note("a", "/Notes", &["drop", "keep"]));
        let index = create(&index, note("b", "/Notes", &["drop"]));

        let next = reduce(
            &index,
            &StorageEvent::DeleteTag {
                repository: REPO.to_string(),
                tag: "drop".to_string(),
            },
        );
        let repo = repo(&next);

        assert!(!repo.tags.contains_key("drop"));
        assert_eq!(repo.note("note:a").unwrap().tags, vec!["keep"]);
        assert!(repo.note("note:b").unwrap().tags.is_empty());
        next.verify().unwrap();
    }

    #[test]
    fn test_move_folder_repoints_notes_and_carries_the_bucket() {
        let index = create(&empty_index(), note("a", "/Old", &[]));
        let index = create(&index, note("b", "/Old", &[]));

        let next = reduce(
            &index,
            &StorageEvent::MoveFolder {
                repository: REPO.to_string(),
                from: "/Old".to_string(),
                to: Folder {
                    path: "/New".to_string(),
                    rev: Some("1-f".to_string()),
                },
            },
        );
        let repo = repo(&next);

        assert!(!repo.folders.contains_key("/Old"));
        let entry = &repo.folders["/New"];
        assert_eq!(entry.rev, Some("1-f".to_string()));
        assert_eq!(entry.notes.len(), 2);
        assert_eq!(repo.note("note:a").unwrap().folder, "/New");
        assert_eq!(repo.note("note:b").unwrap().folder, "/New");
        next.verify().unwrap();
    }

    #[test]
    fn test_move_folder_merges_into_existing_target() {
        let index = create(&empty_index(), note("a", "/Old", &[]));
        let index = create(&index, note("b", "/New", &[]));

        let next = reduce(
            &index,
            &StorageEvent::MoveFolder {
                repository: REPO.to_string(),
                from: "/Old".to_string(),
                to: Folder {
                    path: "/New".to_string(),
                    rev: Some("2-f".to_string()),
                },
            },
        );
        let repo = repo(&next);

        assert_eq!(repo.folders["/New"].notes.len(), 2);
        next.verify().unwrap();
    }

    #[test]
    fn test_rename_tag_propagates_to_every_note() {
        let index = create(&empty_index(), note("a", "/Notes", &["new", "tag"]));
        let index = create(&index, note("b", "/Notes", &["new", "tag2"]));

        let next = reduce(
            &index,
            &StorageEvent::RenameTag {
                repository: REPO.to_string(),
                from: "new".to_string(),
                to: "newer".to_string(),
            },
        );
        let repo = repo(&next);

        assert!(!repo.tags.contains_key("new"));
        let bucket = &repo.tags["newer"].notes;
        assert!(bucket.contains("note:a") && bucket.contains("note:b"));
        assert!(repo.note("note:a").unwrap().has_tag("newer"));
        assert!(!repo.note("note:a").unwrap().has_tag("new"));
        assert!(repo.note("note:b").unwrap().has_tag("newer"));
        next.verify().unwrap();
    }

    #[test]
    fn test_rename_tag_deduplicates_against_existing_target() {
        let index = create(&empty_index(), note("a", "/Notes", &["old", "merged"]));

        let next = reduce(
            &index,
            &StorageEvent::RenameTag {
                repository: REPO.to_string(),
                from: "old".to_string(),
                to: "merged".to_string(),
            },
        );
        let repo = repo(&next);

        assert_eq!(repo.note("note:a").unwrap().tags, vec!["merged"]);
        next.verify().unwrap();
    }

    #[test]
    fn test_update_tag_may_create_an_empty_bucket() {
        let next = reduce(
            &empty_index(),
            &StorageEvent::UpdateTag {
                repository: REPO.to_string(),
                tag: "pinned".to_string(),
            },
        );
        assert!(repo(&next).tags["pinned"].notes.is_empty());
    }

    #[test]
    fn test_events_against_unknown_repository_are_no_ops() {
        let index = empty_index();
        let next = reduce(
            &index,
            &StorageEvent::CreateNote {
                repository: "nowhere".to_string(),
                note: note("a", "/Notes", &[]),
            },
        );
        assert_eq!(next, index);
    }

    #[test]
    fn test_reduce_never_mutates_its_input() {
        let index = create(&empty_index(), note("a", "/Notes", &["t"]));
        let before = index.clone();

        let _ = reduce(
            &index,
            &StorageEvent::DeleteNote {
                repository: REPO.to_string(),
                id: "note:a".to_string(),
            },
        );

        assert_eq!(index, before);
    }

    #[test]
    fn test_replay_determinism() {
        let events = vec![
            StorageEvent::CreateNote {
                repository: REPO.to_string(),
                note: note("a", "/Notes", &["x"]),
            },
            StorageEvent::CreateNote {
                repository: REPO.to_string(),
                note: note("b", "/Work", &["x", "y"]),
            },
            StorageEvent::RenameTag {
                repository: REPO.to_string(),
                from: "x".to_string(),
                to: "z".to_string(),
            },
            StorageEvent::DeleteNote {
                repository: REPO.to_string(),
                id: "note:a".to_string(),
            },
        ];

        let replay = || {
            events
                .iter()
                .fold(empty_index(), |acc, event| reduce(&acc, event))
        };

        assert_eq!(replay(), replay());
    }

    #[test]
    fn test_verify_catches_dangling_folder_reference() {
        let mut index = create(&empty_index(), note("a", "/Notes", &[]));
        index
            .repositories
            .get_mut(REPO)
            .unwrap()
            .notes
            .remove("note:a");

        let err = index.verify().unwrap_err();
        assert!(matches!(err, StorageError::InvariantViolation { .. }));
    }

    #[test]
    fn test_verify_catches_missing_tag_membership() {
        let mut index = create(&empty_index(), note("a", "/Notes", &["t"]));
        index.repositories.get_mut(REPO).unwrap().tags.remove("t");

        let err = index.verify().unwrap_err();
        assert!(matches!(err, StorageError::InvariantViolation { .. }));
    }

    #[test]
    fn test_tag_counts() {
        let index = create(&empty_index(), note("a", "/Notes", &["x", "y"]));
        let index = create(&index, note("b", "/Notes", &["x"]));

        assert_eq!(
            repo(&index).tag_counts(),
            vec![("x".to_string(), 2), ("y".to_string(), 1)]
        );
    }

    #[test]
    fn test_notes_in_folder_and_with_tag() {
        let index = create(&empty_index(), note("a", "/Work", &["x"]));
        let index = create(&index, note("b", "/Work", &[]));

        let repo = repo(&index);
        assert_eq!(repo.notes_in_folder("/Work").len(), 2);
        assert_eq!(repo.notes_in_folder("/Nowhere").len(), 0);
        assert_eq!(repo.notes_with_tag("x").len(), 1);
        assert_eq!(repo.notes_with_tag("missing").len(), 0);
    }
}
