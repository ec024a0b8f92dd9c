use super::mtime::{canonical_mtime, compare_mtimes, same_instant, MtimeComparison};
use crate::storage::models::CatalogEntry;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// What the filesystem currently says about a catalog path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveState {
    /// Nothing at the path, not even a dangling link.
    Missing,
    /// A symlink whose target does not exist.
    BrokenLink,
    Present {
        is_dir: bool,
        size: u64,
        mtime: Option<String>,
        /// Fully resolved path, when resolution succeeded.
        real_path: Option<PathBuf>,
    },
}

impl LiveState {
    pub fn probe(path: &Path) -> LiveState {
        let link_metadata = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(_) => return LiveState::Missing,
        };
        let metadata = if link_metadata.file_type().is_symlink() {
            match fs::metadata(path) {
                Ok(m) => m,
                Err(_) => return LiveState::BrokenLink,
            }
        } else {
            link_metadata
        };

        LiveState::Present {
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            mtime: metadata.modified().ok().map(canonical_mtime),
            real_path: fs::canonicalize(path).ok(),
        }
    }
}

/// Per-entry classification; several flags may be set at once, except that
/// `broken` and `deleted` suppress every other check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeFlags {
    pub modified: bool,
    pub broken: bool,
    pub deleted: bool,
    pub type_changed: bool,
    pub bad_mtime: bool,
    pub link_resolved: bool,
}

impl ChangeFlags {
    pub fn is_clean(&self) -> bool {
        *self == ChangeFlags::default()
    }
}

pub fn classify(entry: &CatalogEntry, live: &LiveState) -> ChangeFlags {
    let mut flags = ChangeFlags::default();

    let (is_dir, mtime, real_path) = match live {
        LiveState::BrokenLink => {
            flags.broken = true;
            return flags;
        }
        LiveState::Missing => {
            flags.deleted = true;
            return flags;
        }
        LiveState::Present {
            is_dir,
            mtime,
            real_path,
            ..
        } => (*is_dir, mtime, real_path),
    };

    if entry.is_dir != is_dir {
        flags.type_changed = true;
    }

    if let Some(live_mtime) = mtime {
        match compare_mtimes(&entry.mod_time, live_mtime) {
            MtimeComparison::Same => {}
            MtimeComparison::SubsecondOnly => flags.bad_mtime = true,
            MtimeComparison::Different => flags.modified = true,
        }
    }

    if let Some(real_path) = real_path {
        if *real_path != entry.path() {
            flags.link_resolved = true;
        }
    }

    flags
}

/// Entries whose path no longer resolves to anything on disk.
pub fn unknown_paths(entries: &[CatalogEntry]) -> impl Iterator<Item = PathBuf> + '_ {
    entries
        .iter()
        .map(CatalogEntry::path)
        .filter(|path| !path.exists())
}

/// Entries that exist but whose size or modification time no longer matches
/// the record, meaning the stored fingerprint cannot be trusted.
/// Entries that disappear while being checked are skipped.
pub fn invalidated_paths(entries: &[CatalogEntry]) -> impl Iterator<Item = PathBuf> + '_ {
    entries.iter().filter_map(|entry| {
        let path = entry.path();
        match is_invalidated(entry, &path) {
            Ok(true) => Some(path),
            Ok(false) => None,
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Could not stat {}: {}", path.display(), e);
                None
            }
        }
    })
}

fn is_invalidated(entry: &CatalogEntry, path: &Path) -> io::Result<bool> {
    let metadata = fs::metadata(path)?;
    let live_size = if metadata.is_dir() { 0 } else { metadata.len() as i64 };
    if live_size != entry.size {
        return Ok(true);
    }
    let live_mtime = canonical_mtime(metadata.modified()?);
    Ok(!same_instant(&entry.mod_time, &live_mtime))
}

/// Lazily classify every entry against the live filesystem.
pub fn classify_entries(
    entries: &[CatalogEntry],
) -> impl Iterator<Item = (PathBuf, ChangeFlags)> + '_ {
    entries.iter().map(|entry| {
        let path = entry.path();
        let flags = classify(entry, &LiveState::probe(&path));
        (path, flags)
    })
}

/// Paths needing attention, bucketed by kind of change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeReport {
    pub modified: Vec<PathBuf>,
    pub broken: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    #[serde(rename = "type")]
    pub type_changed: Vec<PathBuf>,
    #[serde(rename = "badmtime")]
    pub bad_mtime: Vec<PathBuf>,
    #[serde(rename = "linkres")]
    pub link_resolved: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeCounts {
    pub modified: usize,
    pub broken: usize,
    pub deleted: usize,
    #[serde(rename = "type")]
    pub type_changed: usize,
    #[serde(rename = "badmtime")]
    pub bad_mtime: usize,
    #[serde(rename = "linkres")]
    pub link_resolved: usize,
}

impl ChangeReport {
    pub fn record(&mut self, path: PathBuf, flags: ChangeFlags) {
        let buckets = [
            (flags.modified, &mut self.modified),
            (flags.broken, &mut self.broken),
            (flags.deleted, &mut self.deleted),
            (flags.type_changed, &mut self.type_changed),
            (flags.bad_mtime, &mut self.bad_mtime),
            (flags.link_resolved, &mut self.link_resolved),
        ];
        for (set, bucket) in buckets {
            if set {
                bucket.push(path.clone());
            }
        }
    }

    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            modified: self.modified.len(),
            broken: self.broken.len(),
            deleted: self.deleted.len(),
            type_changed: self.type_changed.len(),
            bad_mtime: self.bad_mtime.len(),
            link_resolved: self.link_resolved.len(),
        }
    }
}

/// Combined classification pass over the whole catalog.
pub fn changed_paths(entries: &[CatalogEntry]) -> ChangeReport {
    let mut report = ChangeReport::default();
    for (path, flags) in classify_entries(entries) {
        if !flags.is_clean() {
            report.record(path, flags);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mod_time: &str, is_dir: bool) -> CatalogEntry {
        CatalogEntry {
            id: 1,
            directory: "/music".to_string(),
            name: "song.flac".to_string(),
            fingerprint: "abc".to_string(),
            mod_time: mod_time.to_string(),
            size: 10,
            is_dir,
        }
    }

    fn present(mtime: &str, is_dir: bool) -> LiveState {
        LiveState::Present {
            is_dir,
            size: 10,
            mtime: Some(mtime.to_string()),
            real_path: Some(PathBuf::from("/music/song.flac")),
        }
    }

    #[test]
    fn test_subsecond_difference_is_bad_mtime_not_modified() {
        let flags = classify(
            &entry("2020-01-01 00:00:00", false),
            &present("2020-01-01 00:00:00.0", false),
        );
        assert!(flags.bad_mtime);
        assert!(!flags.modified);
    }

    #[test]
    fn test_real_change_is_modified() {
        let flags = classify(
            &entry("2020-01-01 00:00:00", false),
            &present("2021-06-01 12:00:00", false),
        );
        assert!(flags.modified);
        assert!(!flags.bad_mtime);
    }

    #[test]
    fn test_broken_and_deleted_short_circuit() {
        let e = entry("2020-01-01 00:00:00", true);
        assert_eq!(
            classify(&e, &LiveState::BrokenLink),
            ChangeFlags {
                broken: true,
                ..Default::default()
            }
        );
        assert_eq!(
            classify(&e, &LiveState::Missing),
            ChangeFlags {
                deleted: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_type_and_mtime_checked_independently() {
        let flags = classify(
            &entry("2020-01-01 00:00:00", false),
            &present("2021-01-01 00:00:00", true),
        );
        assert!(flags.type_changed);
        assert!(flags.modified);
    }

    #[test]
    fn test_link_resolution_to_other_path() {
        let live = LiveState::Present {
            is_dir: false,
            size: 10,
            mtime: Some("2020-01-01 00:00:00".to_string()),
            real_path: Some(PathBuf::from("/archive/song.flac")),
        };
        let flags = classify(&entry("2020-01-01 00:00:00", false), &live);
        assert!(flags.link_resolved);
        assert!(!flags.modified);
    }

    #[test]
    fn test_report_counts() {
        let mut report = ChangeReport::default();
        report.record(
            PathBuf::from("/a"),
            ChangeFlags {
                modified: true,
                type_changed: true,
                ..Default::default()
            },
        );
        report.record(
            PathBuf::from("/b"),
            ChangeFlags {
                deleted: true,
                ..Default::default()
            },
        );
        let counts = report.counts();
        assert_eq!(counts.modified, 1);
        assert_eq!(counts.type_changed, 1);
        assert_eq!(counts.deleted, 1);
        assert_eq!(counts.broken, 0);
    }

    #[test]
    fn test_report_uses_check_category_names() {
        let mut report = ChangeReport::default();
        report.record(
            PathBuf::from("/a"),
            ChangeFlags {
                bad_mtime: true,
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["badmtime"][0], "/a");
        assert!(json.get("type").is_some());
        assert!(json.get("linkres").is_some());

        let counts = serde_json::to_value(report.counts()).unwrap();
        assert_eq!(counts["badmtime"], 1);
    }
}
