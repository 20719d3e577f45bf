//! Repository discovery and lifecycle
//!
//! A repository is a named document store living in its own subdirectory of
//! the data directory (`<data_dir>/<name>/store.db`). The registry scans
//! the data directory lazily on first use and keeps the open store handles
//! for the life of the process. Repositories are never deleted implicitly.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, info};

use crate::docid::{self, DEFAULT_FOLDER};
use crate::models::{Folder, Note};
use crate::storage::{DocumentStore, StorageError, StorageResult};

/// File name of the document database inside a repository directory
const STORE_FILE: &str = "store.db";

/// Name of the repository created when none exist
pub const DEFAULT_REPOSITORY: &str = "notebook";

/// Documents of one repository, partitioned by ID prefix
#[derive(Debug, Clone, Default)]
pub struct RepositorySnapshot {
    pub notes: Vec<Note>,
    pub folders: Vec<Folder>,
}

/// Snapshot of every repository, used to (re)build the index
pub type StorageSnapshot = BTreeMap<String, RepositorySnapshot>;

/// Ordered collection of named repository stores
pub struct RepositoryRegistry {
    root: PathBuf,
    stores: BTreeMap<String, DocumentStore>,
    discovered: bool,
}

impl RepositoryRegistry {
    /// Create a registry over the given data directory
    ///
    /// Nothing is touched on disk until the first discovery.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            stores: BTreeMap::new(),
            discovered: false,
        }
    }

    /// Data directory this registry scans
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open every repository found under the data directory
    ///
    /// Runs once; subsequent calls reuse the cached handles.
    fn discover(&mut self) -> StorageResult<()> {
        if self.discovered {
            return Ok(());
        }

        fs::create_dir_all(&self.root).map_err(|e| StorageError::CreateDirectory {
            path: self.root.clone(),
            source: e,
        })?;

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let store_path = entry.path().join(STORE_FILE);
            if !store_path.exists() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let store = DocumentStore::open(&store_path)?;
            self.stores.insert(name, store);
        }

        self.discovered = true;
        debug!(count = self.stores.len(), root = %self.root.display(), "repositories discovered");
        Ok(())
    }

    /// The discovered repositories, ordered by name
    pub fn list(&mut self) -> StorageResult<&BTreeMap<String, DocumentStore>> {
        self.discover()?;
        Ok(&self.stores)
    }

    /// Names of the discovered repositories
    pub fn names(&mut self) -> StorageResult<Vec<String>> {
        self.discover()?;
        Ok(self.stores.keys().cloned().collect())
    }

    /// Guarantee at least one repository exists
    pub fn ensure_default(&mut self) -> StorageResult<()> {
        self.discover()?;
        if self.stores.is_empty() {
            self.create(DEFAULT_REPOSITORY)?;
        }
        Ok(())
    }

    /// Create a repository, seeding it with the default folder document
    ///
    /// Creating a repository that already exists is a no-op.
    pub fn create(&mut self, name: &str) -> StorageResult<()> {
        self.discover()?;

        if !is_valid_repository_name(name) {
            return Err(StorageError::InvalidRepositoryName {
                name: name.to_string(),
            });
        }
        if self.stores.contains_key(name) {
            debug!(name, "repository already exists");
            return Ok(());
        }

        let dir = self.root.join(name);
        fs::create_dir_all(&dir).map_err(|e| StorageError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;

        let mut store = DocumentStore::open(&dir.join(STORE_FILE))?;
        store.put(&docid::folder_id(DEFAULT_FOLDER), json!({}), None)?;
        self.stores.insert(name.to_string(), store);

        info!(name, "repository created");
        Ok(())
    }

    /// Borrow a repository store
    pub fn get(&mut self, name: &str) -> StorageResult<&DocumentStore> {
        self.discover()?;
        self.stores
            .get(name)
            .ok_or_else(|| StorageError::UnknownRepository {
                name: name.to_string(),
            })
    }

    /// Borrow a repository store mutably
    pub fn get_mut(&mut self, name: &str) -> StorageResult<&mut DocumentStore> {
        self.discover()?;
        self.stores
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownRepository {
                name: name.to_string(),
            })
    }

    /// List every document of every repository, partitioned by ID prefix
    ///
    /// Every snapshot includes a default folder entry even when no folder
    /// document exists on disk. Malformed documents fail the load; nothing
    /// is skipped silently.
    pub fn load_all(&mut self) -> StorageResult<StorageSnapshot> {
        self.discover()?;

        let mut snapshot = StorageSnapshot::new();
        for (name, store) in &self.stores {
            let mut repo = RepositorySnapshot::default();
            for doc in store.list_all()? {
                if docid::is_note_id(&doc.id) {
                    repo.notes.push(Note::from_document(&doc)?);
                } else if let Some(path) = docid::folder_path(&doc.id) {
                    repo.folders.push(Folder {
                        path: path.to_string(),
                        rev: Some(doc.rev.clone()),
                    });
                } else {
                    debug!(id = %doc.id, repository = %name, "skipping document with unknown prefix");
                }
            }

            if !repo.folders.iter().any(|f| f.path == DEFAULT_FOLDER) {
                repo.folders.push(Folder {
                    path: DEFAULT_FOLDER.to_string(),
                    rev: None,
                });
            }

            snapshot.insert(name.clone(), repo);
        }

        Ok(snapshot)
    }
}

/// Repository names are single path segments: word characters and dashes
fn is_valid_repository_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}
