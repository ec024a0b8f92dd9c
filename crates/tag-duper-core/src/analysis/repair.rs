use crate::error::Error;
use crate::hasher::{self, Algorithm, ALGORITHM_SETTING};
use crate::progress::ProgressReporter;
use crate::scanner::{canonical_mtime, invalidated_paths};
use crate::storage::models::CatalogEntry;
use crate::storage::Database;
use ahash::AHashSet;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Freshly computed on-disk state of one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveRecord {
    pub path: PathBuf,
    /// Empty for directories, as the catalog stores them.
    pub fingerprint: String,
    pub mod_time: String,
    pub size: i64,
    pub is_dir: bool,
}

impl LiveRecord {
    pub fn compute(path: &Path, algorithm: Algorithm) -> Result<Self, Error> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let is_dir = metadata.is_dir();
        Ok(Self {
            path: path.to_path_buf(),
            fingerprint: hasher::fingerprint(path, algorithm)?.unwrap_or_default(),
            mod_time: canonical_mtime(metadata.modified()?),
            size: if is_dir { 0 } else { metadata.len() as i64 },
            is_dir,
        })
    }
}

/// Compute what `update` would store for each path, without writing anything.
pub fn preview_update(paths: &[PathBuf], algorithm: Algorithm) -> Vec<Result<LiveRecord, Error>> {
    paths
        .iter()
        .map(|path| LiveRecord::compute(path, algorithm))
        .collect()
}

/// Move the record for `old_path` to `new_path`, after checking that the new
/// path really is the same file.
///
/// Fails with `NotFound` if `new_path` is absent on disk or `old_path` has no
/// record, `Conflict` if `new_path` already has a record, and
/// `IntegrityMismatch` if the file type differs or (unless
/// `ignore_fingerprint`) the fingerprint differs. Nothing is written on failure.
pub fn repair_path(
    db: &Database,
    old_path: &Path,
    new_path: &Path,
    ignore_fingerprint: bool,
) -> Result<(), Error> {
    if !new_path.exists() {
        return Err(Error::NotFound(new_path.to_path_buf()));
    }
    let entry = db
        .entry_by_path(old_path)?
        .ok_or_else(|| Error::NotFound(old_path.to_path_buf()))?;
    if db.file_id(new_path)?.is_some() {
        return Err(Error::Conflict(new_path.to_path_buf()));
    }

    let algorithm = db.fingerprint_algorithm()?;
    let live = LiveRecord::compute(new_path, algorithm)?;

    if live.is_dir != entry.is_dir {
        return Err(Error::IntegrityMismatch {
            path: new_path.to_path_buf(),
            detail: format!(
                "recorded is_dir={} but found is_dir={}",
                entry.is_dir, live.is_dir
            ),
        });
    }
    if live.fingerprint != entry.fingerprint {
        if !ignore_fingerprint {
            return Err(Error::IntegrityMismatch {
                path: new_path.to_path_buf(),
                detail: format!(
                    "recorded fingerprint {} does not match {}",
                    entry.fingerprint, live.fingerprint
                ),
            });
        }
        warn!(
            "Fingerprint of {} differs from record; keeping the new one",
            new_path.display()
        );
    }

    let tx = db.connection().unchecked_transaction()?;
    db.move_entry(entry.id, new_path)?;
    db.update_fingerprint(entry.id, &live.fingerprint, &live.mod_time, live.size)?;
    tx.commit()?;

    info!("Repaired {} -> {}", old_path.display(), new_path.display());
    Ok(())
}

/// Switch the catalog to another algorithm. Every stored fingerprint becomes
/// meaningless, so all records are invalidated in the same transaction.
pub fn change_fingerprint_algorithm(db: &Database, algorithm: Algorithm) -> Result<usize, Error> {
    let tx = db.connection().unchecked_transaction()?;
    db.set_setting(ALGORITHM_SETTING, algorithm.name())?;
    let invalidated = db.invalidate_all_fingerprints()?;
    tx.commit()?;

    info!(
        "Fingerprint algorithm set to {}; {} records invalidated",
        algorithm, invalidated
    );
    Ok(invalidated)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshSummary {
    pub candidates: usize,
    pub updated: usize,
    pub failed: Vec<PathBuf>,
}

/// Recompute fingerprints for every stale record that still exists.
///
/// Hashing runs in parallel; all updates are written in one transaction.
pub fn refresh_fingerprints(
    db: &Database,
    reporter: &dyn ProgressReporter,
) -> Result<RefreshSummary, Error> {
    let algorithm = db.fingerprint_algorithm()?;
    let entries = db.all_entries()?;
    let stale: AHashSet<PathBuf> = invalidated_paths(&entries).collect();
    let targets: Vec<&CatalogEntry> = entries
        .iter()
        .filter(|e| stale.contains(&e.path()))
        .collect();

    let total = targets.len();
    info!("Refreshing {} fingerprints with {}", total, algorithm);
    reporter.on_hash_start(total);
    let start = Instant::now();
    let hashed = AtomicUsize::new(0);

    let results: Vec<(i64, Result<LiveRecord, Error>)> = targets
        .par_iter()
        .map(|entry| {
            let record = LiveRecord::compute(&entry.path(), algorithm);
            let done = hashed.fetch_add(1, Ordering::Relaxed) + 1;
            reporter.on_hash_progress(done, total);
            (entry.id, record)
        })
        .collect();

    let mut summary = RefreshSummary {
        candidates: total,
        ..Default::default()
    };
    let tx = db.connection().unchecked_transaction()?;
    for (file_id, result) in results {
        match result {
            Ok(record) => {
                db.update_fingerprint(file_id, &record.fingerprint, &record.mod_time, record.size)?;
                summary.updated += 1;
            }
            Err(Error::NotFound(path)) => {
                debug!("{} disappeared before it could be hashed", path.display());
            }
            Err(e) => {
                warn!("Could not refresh record {}: {}", file_id, e);
                if let Some(entry) = entries.iter().find(|entry| entry.id == file_id) {
                    summary.failed.push(entry.path());
                }
            }
        }
    }
    tx.commit()?;

    reporter.on_hash_complete(summary.updated, start.elapsed().as_secs_f64());
    Ok(summary)
}
