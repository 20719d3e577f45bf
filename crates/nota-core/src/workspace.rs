//! Unified storage interface
//!
//! The `Workspace` owns the storage manager and the current index snapshot
//! and keeps the two in step:
//!
//! - every mutation is written durably first, through the manager
//! - the event describing the completed mutation is then reduced into a
//!   fresh index snapshot
//!
//! Reads are served from the snapshot without touching the stores. The
//! snapshot is replaced, never mutated in place, so references handed out
//! earlier keep describing the state they were read from.
//!
//! ## Usage
//!
//! ```ignore
//! let mut workspace = Workspace::open()?;  // Discovers repositories
//!
//! let note = workspace.create_note("notebook", NoteDraft {
//!     content: "# groceries\n- eggs".into(),
//!     ..Default::default()
//! })?;
//!
//! let repo = workspace.repository("notebook").unwrap();
//! assert!(repo.note(&note.id).is_some());
//! ```

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Config;
use crate::events::StorageEvent;
use crate::index::{reduce, RepositoryIndex, StorageIndex};
use crate::manager::StorageManager;
use crate::models::{Folder, Note, NoteDraft, NotePatch};
use crate::registry::RepositoryRegistry;
use crate::storage::{StorageError, StorageResult};

/// The application's storage state: manager plus derived index
pub struct Workspace {
    manager: StorageManager,
    index: StorageIndex,
    config: Config,
}

impl Workspace {
    /// Open the workspace using the default configuration
    ///
    /// Guarantees at least one repository exists and loads the initial
    /// index from disk.
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config).context("Failed to open workspace")
    }

    /// Open the workspace with a specific configuration
    pub fn open_with_config(config: Config) -> StorageResult<Self> {
        let mut registry = RepositoryRegistry::new(&config.data_dir);
        registry.ensure_default()?;

        let mut manager = StorageManager::new(registry);
        let event = manager.load_all()?;
        let index = reduce(&StorageIndex::default(), &event);

        debug!(repositories = index.repositories.len(), "workspace opened");
        Ok(Self {
            manager,
            index,
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current index snapshot
    pub fn index(&self) -> &StorageIndex {
        &self.index
    }

    /// Index of one repository
    pub fn repository(&self, name: &str) -> Option<&RepositoryIndex> {
        self.index.repository(name)
    }

    /// Names of the known repositories
    pub fn repository_names(&self) -> Vec<String> {
        self.index.repositories.keys().cloned().collect()
    }

    /// Create a repository and fold it into the index
    pub fn create_repository(&mut self, name: &str) -> StorageResult<()> {
        self.manager.registry_mut().create(name)?;
        self.rebuild_index()
    }

    // ==================== Note Operations ====================

    /// Create a note
    pub fn create_note(&mut self, repository: &str, draft: NoteDraft) -> StorageResult<Note> {
        let (note, event) = self.manager.create_note(repository, draft)?;
        self.apply(event);
        Ok(note)
    }

    /// Apply a partial update to a note
    pub fn update_note(
        &mut self,
        repository: &str,
        id: &str,
        patch: NotePatch,
    ) -> StorageResult<Note> {
        let (note, event) = self.manager.update_note(repository, id, patch)?;
        self.apply(event);
        Ok(note)
    }

    /// Delete a note
    pub fn delete_note(&mut self, repository: &str, id: &str) -> StorageResult<()> {
        let event = self.manager.delete_note(repository, id)?;
        self.apply(event);
        Ok(())
    }

    // ==================== Folder Operations ====================

    /// Create or refresh a folder
    pub fn upsert_folder(&mut self, repository: &str, path: &str) -> StorageResult<Folder> {
        let (folder, event) = self.manager.upsert_folder(repository, path)?;
        self.apply(event);
        Ok(folder)
    }

    /// Delete a folder and every note it contains
    pub fn delete_folder(&mut self, repository: &str, path: &str) -> StorageResult<()> {
        let event = self.manager.delete_folder(repository, path)?;
        self.apply(event);
        Ok(())
    }

    /// Rename a folder, carrying its notes along
    pub fn rename_folder(
        &mut self,
        repository: &str,
        old_path: &str,
        new_path: &str,
    ) -> StorageResult<()> {
        let event = self.manager.rename_folder(repository, old_path, new_path)?;
        self.apply(event);
        Ok(())
    }

    // ==================== Tag Operations ====================

    /// Rename a tag on every note carrying it
    pub fn rename_tag(
        &mut self,
        repository: &str,
        old_tag: &str,
        new_tag: &str,
    ) -> StorageResult<()> {
        let event = self.manager.rename_tag(repository, old_tag, new_tag)?;
        self.apply(event);
        Ok(())
    }

    /// Remove a tag from every note carrying it
    pub fn delete_tag(&mut self, repository: &str, tag: &str) -> StorageResult<()> {
        let event = self.manager.delete_tag(repository, tag)?;
        self.apply(event);
        Ok(())
    }

    // ==================== Maintenance ====================

    /// Rebuild the index from the stores
    ///
    /// Useful if the index is suspected to have drifted, and after
    /// repository creation.
    pub fn rebuild_index(&mut self) -> StorageResult<()> {
        let event = self.manager.load_all()?;
        self.apply(event);
        Ok(())
    }

    /// Check that the index agrees with itself and with the stores
    ///
    /// Verifies internal membership invariants, then reloads every store
    /// and compares the structural state (note IDs, folder assignment, tag
    /// sets, folder documents). Reports `InvariantViolation` on divergence.
    pub fn verify(&mut self) -> StorageResult<()> {
        self.index.verify()?;

        let event = self.manager.load_all()?;
        let rebuilt = reduce(&StorageIndex::default(), &event);

        for (name, fresh) in &rebuilt.repositories {
            let cached = self.index.repository(name).ok_or_else(|| {
                StorageError::InvariantViolation {
                    details: format!("repository '{}' missing from the index", name),
                }
            })?;

            let fresh_ids: Vec<&String> = fresh.notes.keys().collect();
            let cached_ids: Vec<&String> = cached.notes.keys().collect();
            if fresh_ids != cached_ids {
                return Err(StorageError::InvariantViolation {
                    details: format!("note IDs diverged in repository '{}'", name),
                });
            }

            for (id, note) in &fresh.notes {
                let cached_note = &cached.notes[id];
                if cached_note.folder != note.folder || cached_note.tags != note.tags {
                    return Err(StorageError::InvariantViolation {
                        details: format!("note '{}' diverged in repository '{}'", id, name),
                    });
                }
            }

            for (path, entry) in &fresh.folders {
                if entry.rev.is_some() && !cached.folders.contains_key(path) {
                    return Err(StorageError::InvariantViolation {
                        details: format!(
                            "folder '{}' exists on disk but not in the index of '{}'",
                            path, name
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    fn apply(&mut self, event: StorageEvent) {
        self.index = reduce(&self.index, &event);
    }
}
