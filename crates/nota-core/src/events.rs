//! Mutation events
//!
//! Every successful `StorageManager` operation yields one `StorageEvent`
//! describing the durably completed mutation. The index reducer consumes
//! events; nothing else may change the index. Replaying the same event
//! sequence against an empty index always produces the same snapshot.

use crate::models::{Folder, Note};
use crate::registry::StorageSnapshot;

/// A durably completed mutation, ready for the index to consume
#[derive(Debug, Clone)]
pub enum StorageEvent {
    /// Replace the entire index with a freshly loaded snapshot
    /// (startup and full resync)
    LoadAll { snapshot: StorageSnapshot },

    /// A note document was written for the first time
    CreateNote { repository: String, note: Note },

    /// A note document was rewritten; the index diffs folder and tag
    /// membership against its previous entry
    UpdateNote { repository: String, note: Note },

    /// A note document was tombstoned
    DeleteNote { repository: String, id: String },

    /// A folder document was written; membership is untouched
    UpdateFolder { repository: String, folder: Folder },

    /// A folder and every note it contained were removed
    DeleteFolder { repository: String, path: String },

    /// A tag bucket was touched without changing membership
    UpdateTag { repository: String, tag: String },

    /// A tag was removed from every note carrying it
    DeleteTag { repository: String, tag: String },

    /// Every note under `from` was re-pointed at the folder in `to`
    MoveFolder {
        repository: String,
        from: String,
        to: Folder,
    },

    /// Every note carrying `from` now carries `to` instead
    RenameTag {
        repository: String,
        from: String,
        to: String,
    },
}
