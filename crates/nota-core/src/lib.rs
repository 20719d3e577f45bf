//! nota core library
//!
//! Local-first storage for hierarchical notes: named repositories backed
//! by revisioned document stores, with a derived in-memory index kept
//! consistent by a pure reducer.
//!
//! # Architecture
//!
//! - **DocumentStore**: source of truth, one SQLite database per repository
//! - **StorageIndex**: derived cache, rebuilt from a snapshot or advanced
//!   one `StorageEvent` at a time by the reducer
//!
//! Every mutation is written durably first; only then does the event it
//! produced reach the index.
//!
//! # Quick Start
//!
//! ```text
//! let mut workspace = Workspace::open()?;
//!
//! let note = workspace.create_note("notebook", NoteDraft {
//!     content: "# groceries\n- eggs".into(),
//!     ..Default::default()
//! })?;
//!
//! let repo = workspace.repository("notebook").unwrap();
//! let in_default = repo.notes_in_folder("/Notes");
//! ```
//!
//! # Modules
//!
//! - `workspace`: unified storage interface (main entry point)
//! - `manager`: storage orchestration, one event per mutation
//! - `index`: the derived index and its reducer
//! - `events`: mutation events
//! - `registry`: repository discovery and lifecycle
//! - `storage`: revisioned document store
//! - `models`: notes, folders, drafts, and patches
//! - `docid`: document ID conventions
//! - `config`: application configuration

pub mod config;
pub mod docid;
pub mod events;
pub mod index;
pub mod manager;
pub mod models;
pub mod registry;
pub mod storage;
pub mod workspace;

pub use config::Config;
pub use docid::DEFAULT_FOLDER;
pub use events::StorageEvent;
pub use index::{reduce, FolderEntry, RepositoryIndex, StorageIndex, TagEntry};
pub use manager::StorageManager;
pub use models::{Folder, Note, NoteDraft, NoteMeta, NotePatch};
pub use registry::{RepositoryRegistry, RepositorySnapshot, StorageSnapshot, DEFAULT_REPOSITORY};
pub use storage::{Document, DocumentStore, StorageError, StorageResult};
pub use workspace::Workspace;
