//! Data models for nota
//!
//! Notes and folders as they live in a repository document store, plus the
//! draft and patch inputs accepted by the storage manager.
//!
//! A note's persisted body is camelCase JSON
//! (`{ meta, content, tags, folder, createdAt, updatedAt }`); the document
//! ID and revision live in store columns and are carried on the in-memory
//! `Note` alongside the body fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{Document, StorageError, StorageResult};

/// Maximum length of a derived preview, in characters
const PREVIEW_MAX_CHARS: usize = 120;

/// Title and preview metadata stored alongside note content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteMeta {
    #[serde(default)]
    pub title: String,
    /// Derived from content on create/update; see [`derive_preview`]
    #[serde(default)]
    pub preview: String,
}

/// A note, as read from or written to a repository store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    /// Full document ID (`note:<hex>`)
    pub id: String,
    /// Current revision of the underlying document
    pub rev: String,
    pub meta: NoteMeta,
    pub content: String,
    /// Duplicate-free, in insertion order
    pub tags: Vec<String>,
    /// Path of the folder containing this note, always `/`-prefixed
    pub folder: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The persisted shape of a note body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteBody {
    #[serde(default)]
    meta: NoteMeta,
    #[serde(default)]
    content: String,
    #[serde(default)]
    tags: Vec<String>,
    folder: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Note {
    /// Parse a note out of a stored document
    pub fn from_document(doc: &Document) -> StorageResult<Self> {
        let body: NoteBody =
            serde_json::from_value(doc.body.clone()).map_err(|e| StorageError::InvalidDocument {
                id: doc.id.clone(),
                details: e.to_string(),
            })?;

        Ok(Self {
            id: doc.id.clone(),
            rev: doc.rev.clone(),
            meta: body.meta,
            content: body.content,
            tags: body.tags,
            folder: body.folder,
            created_at: body.created_at,
            updated_at: body.updated_at,
        })
    }

    /// Serialize the body fields for persistence (ID and revision excluded)
    pub fn to_body(&self) -> Value {
        serde_json::json!({
            "meta": {
                "title": self.meta.title,
                "preview": self.meta.preview,
            },
            "content": self.content,
            "tags": self.tags,
            "folder": self.folder,
            "createdAt": self.created_at,
            "updatedAt": self.updated_at,
        })
    }

    /// Check whether this note carries the given tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A folder entry keyed by path
///
/// `rev` is `None` for folders that exist only implicitly (notes reference
/// the path but no folder document has been written yet).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Folder {
    pub path: String,
    pub rev: Option<String>,
}

impl Folder {
    /// The document ID this folder is stored under
    pub fn doc_id(&self) -> String {
        crate::docid::folder_id(&self.path)
    }
}

/// Input for creating a note
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    /// Defaults to the derived preview of the content
    pub title: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    /// Defaults to the repository's default folder
    pub folder: Option<String>,
}

/// Partial update for a note
///
/// `None` fields keep their previous value; meta fields merge by key, not
/// wholesale. Setting `content` re-derives the preview unless `preview` is
/// also given.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub preview: Option<String>,
    pub content: Option<String>,
    /// Replaces the full tag set when present
    pub tags: Option<Vec<String>>,
    pub folder: Option<String>,
}

/// Derive a preview from note content
///
/// The first non-empty line, with leading markdown heading markers
/// stripped, truncated on a character boundary.
pub fn derive_preview(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    let line = line.trim_start_matches('#').trim_start();
    line.chars().take(PREVIEW_MAX_CHARS).collect()
}

/// Drop duplicate and empty tags, keeping first-seen order
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
