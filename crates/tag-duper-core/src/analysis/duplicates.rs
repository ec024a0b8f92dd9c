use crate::storage::models::CatalogEntry;
use ahash::AHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// fingerprint → paths sharing it, ordered by fingerprint.
pub type DuplicateMap = BTreeMap<String, Vec<PathBuf>>;

/// Group catalog paths sharing a fingerprint.
///
/// Only fingerprints occurring more than once form a group. Empty fingerprints
/// (directories, never-hashed records) and records invalidated by an algorithm
/// change are left out. Some members may no longer exist on disk; filtering by
/// existence is up to the caller.
pub fn duplicated_paths(entries: &[CatalogEntry]) -> DuplicateMap {
    let comparable = || {
        entries
            .iter()
            .filter(|e| !e.fingerprint.is_empty() && !e.is_invalidated())
    };

    let mut counts: AHashMap<&str, usize> = AHashMap::new();
    for entry in comparable() {
        *counts.entry(entry.fingerprint.as_str()).or_default() += 1;
    }

    let mut duplicates = DuplicateMap::new();
    for entry in comparable() {
        if counts.get(entry.fingerprint.as_str()).copied().unwrap_or(0) > 1 {
            duplicates
                .entry(entry.fingerprint.clone())
                .or_default()
                .push(entry.path());
        }
    }

    debug!("{} duplicated fingerprints", duplicates.len());
    duplicates
}

/// Members of a group that still exist on disk, in their original order.
pub fn existing_members(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths.iter().filter(|p| p.exists()).cloned().collect()
}

/// Summary for `dupes --stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateStats {
    /// Groups meeting the existing-member minimum.
    pub groups: usize,
    /// Catalog records across those groups.
    pub files: usize,
    /// Records in those groups still present on disk.
    pub existing_files: usize,
    /// Bytes freed if each group were reduced to one existing member.
    pub reclaimable_bytes: u64,
}

pub fn duplicate_stats(entries: &[CatalogEntry], minimum: usize) -> DuplicateStats {
    let sizes: AHashMap<PathBuf, i64> = entries.iter().map(|e| (e.path(), e.size)).collect();
    let mut stats = DuplicateStats::default();

    for paths in duplicated_paths(entries).values() {
        let existing = existing_members(paths);
        if existing.len() < minimum || existing.is_empty() {
            continue;
        }
        let size = existing
            .first()
            .and_then(|p| sizes.get(p))
            .copied()
            .unwrap_or(0)
            .max(0) as u64;

        stats.groups += 1;
        stats.files += paths.len();
        stats.existing_files += existing.len();
        stats.reclaimable_bytes += size * (existing.len() as u64 - 1);
    }

    stats
}
