use serde::Serialize;
use std::path::PathBuf;

/// `size` value marking a record whose fingerprint must be recomputed.
pub const INVALID_SIZE: i64 = -1;

/// A row of the catalog's `file` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: i64,
    pub directory: String,
    pub name: String,
    pub fingerprint: String,
    pub mod_time: String,
    pub size: i64,
    pub is_dir: bool,
}

impl CatalogEntry {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.directory).join(&self.name)
    }

    pub fn is_invalidated(&self) -> bool {
        self.size == INVALID_SIZE
    }
}

/// Fields for inserting a new `file` row.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub path: PathBuf,
    pub fingerprint: String,
    pub mod_time: String,
    pub size: i64,
    pub is_dir: bool,
}

/// A (tag, value) association. `value_id` 0 means the tag carries no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Tagging {
    pub tag_id: i64,
    pub value_id: i64,
}

impl Tagging {
    pub fn tag(tag_id: i64) -> Self {
        Self { tag_id, value_id: 0 }
    }

    pub fn with_value(tag_id: i64, value_id: i64) -> Self {
        Self { tag_id, value_id }
    }
}

/// Emitted whenever a file's taggings are deleted, so that collaborators
/// (alias bookkeeping, reporting) can react without a global hook table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggingsRemoved {
    pub file_id: i64,
    pub path: PathBuf,
    pub removed: usize,
}
