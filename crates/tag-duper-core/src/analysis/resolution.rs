use super::actions::RemovalAction;
use super::duplicates::{duplicated_paths, existing_members};
use super::ranking::{rank_group, ScoredCandidate, SiblingCache};
use crate::config::{DEFAULT_BATCH_LIMIT, DEFAULT_MINIMUM};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::models::{Tagging, TaggingsRemoved};
use crate::storage::Database;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A duplicate group ready for resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedGroup {
    pub fingerprint: String,
    /// Every catalog member, worst-scoring first.
    pub members: Vec<ScoredCandidate>,
    /// Members present on disk at the last check, in ranked order.
    pub existing: Vec<PathBuf>,
}

impl RankedGroup {
    pub fn new(fingerprint: String, paths: &[PathBuf], cache: &mut SiblingCache) -> Self {
        let members = rank_group(paths, cache);
        let mut group = Self {
            fingerprint,
            members,
            existing: Vec::new(),
        };
        group.refresh_existing();
        group
    }

    /// Re-stat every member; existence is never carried across batches.
    pub fn refresh_existing(&mut self) {
        let ranked: Vec<PathBuf> = self.members.iter().map(|c| c.path.clone()).collect();
        self.existing = existing_members(&ranked);
    }

    /// Best-ranked member that exists right now.
    pub fn survivor(&self) -> Option<&Path> {
        self.members
            .iter()
            .rev()
            .map(|c| c.path.as_path())
            .find(|p| p.exists())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    /// Groups with fewer existing members are skipped.
    pub minimum: usize,
    /// Upper bound on paths handed to one action invocation.
    pub limit: usize,
    /// One group per invocation, merges applied after each.
    pub single: bool,
    /// Merge into the best-ranked copy even when several copies remain.
    /// Otherwise such groups are left unmerged.
    pub merge_multiple_survivors: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            minimum: DEFAULT_MINIMUM,
            limit: DEFAULT_BATCH_LIMIT,
            single: false,
            merge_multiple_survivors: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Collecting,
    Ranking,
    Batching,
    Invoking,
    DetectingRemovals,
    Merging,
    Done,
}

/// Result of applying one group's pending merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub fingerprint: String,
    pub survivor: PathBuf,
    /// Taggings newly added to the survivor.
    pub added: usize,
    /// Paths left on disk besides the survivor.
    pub other_survivors: usize,
    pub untagged: Vec<TaggingsRemoved>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassSummary {
    pub groups: usize,
    pub batches: usize,
    pub removed_files: usize,
    pub merges: Vec<MergeOutcome>,
    /// Fingerprints of groups left unmerged because several copies remain.
    pub deferred: Vec<String>,
    /// The pass stopped early on request; later groups were left untouched.
    pub cancelled: bool,
}

/// Taggings collected from removed members of one group.
#[derive(Debug)]
struct PendingMerge {
    group: RankedGroup,
    taggings: BTreeSet<Tagging>,
    removed: Vec<(i64, PathBuf)>,
}

/// Drives one resolution pass over the catalog.
pub struct Resolver<'a> {
    db: &'a Database,
    options: ResolverOptions,
    cancel: Option<Arc<AtomicBool>>,
    state: PassState,
}

impl<'a> Resolver<'a> {
    pub fn new(db: &'a Database, options: ResolverOptions) -> Self {
        Self {
            db,
            options,
            cancel: None,
            state: PassState::Idle,
        }
    }

    /// Stop between batches once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    fn transition(&mut self, next: PassState) {
        debug!("Resolution state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Groups eligible for resolution, ranked, largest first.
    pub fn collect_groups(&mut self) -> Result<Vec<RankedGroup>, Error> {
        self.transition(PassState::Collecting);
        let entries = self.db.all_entries()?;
        let duplicates = duplicated_paths(&entries);

        self.transition(PassState::Ranking);
        let mut cache = SiblingCache::new();
        let mut groups: Vec<RankedGroup> = duplicates
            .into_iter()
            .filter(|(_, paths)| existing_members(paths).len() >= self.options.minimum)
            .map(|(fingerprint, paths)| RankedGroup::new(fingerprint, &paths, &mut cache))
            .collect();
        debug!("Ranked {} groups across {} directories", groups.len(), cache.len());

        groups.sort_by(|a, b| {
            b.existing
                .len()
                .cmp(&a.existing.len())
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        Ok(groups)
    }

    /// Split groups into batches of at most `limit` paths. A group is never
    /// split; one larger than the limit gets a batch to itself.
    pub fn plan_batches(&mut self, groups: Vec<RankedGroup>) -> Vec<Vec<RankedGroup>> {
        self.transition(PassState::Batching);
        let mut batches = Vec::new();
        let mut batch: Vec<RankedGroup> = Vec::new();
        let mut batch_files = 0;

        let mut remaining = groups.into_iter().peekable();
        while let Some(next) = remaining.peek() {
            let files = next.existing.len();
            let full = self.options.single || batch_files + files > self.options.limit;
            if full && !batch.is_empty() {
                batches.push(mem::take(&mut batch));
                batch_files = 0;
                continue;
            }
            if let Some(group) = remaining.next() {
                batch_files += files;
                batch.push(group);
            }
        }
        if !batch.is_empty() {
            batches.push(batch);
        }
        batches
    }

    /// Run a full pass: collect, rank, batch, invoke the action per batch,
    /// detect removals, and move removed members' taggings to survivors.
    pub fn run(
        &mut self,
        action: &mut dyn RemovalAction,
        reporter: &dyn ProgressReporter,
    ) -> Result<PassSummary, Error> {
        let groups = self.collect_groups()?;
        let total_files = groups.iter().map(|g| g.existing.len()).sum();
        let mut summary = PassSummary {
            groups: groups.len(),
            ..Default::default()
        };
        reporter.on_pass_start(groups.len(), total_files);
        info!(
            "{} duplicate groups ({} files) eligible for resolution",
            groups.len(),
            total_files
        );

        let batches = self.plan_batches(groups);
        let mut pending: BTreeMap<String, PendingMerge> = BTreeMap::new();

        for (index, mut batch) in batches.into_iter().enumerate() {
            if self.cancelled() {
                info!("Resolution cancelled before batch {}", index + 1);
                summary.cancelled = true;
                break;
            }

            for group in batch.iter_mut() {
                group.refresh_existing();
            }
            batch.retain(|g| {
                let keep = g.existing.len() >= self.options.minimum;
                if !keep {
                    debug!("Group {} no longer has enough members, skipping", g.fingerprint);
                }
                keep
            });
            if batch.is_empty() {
                continue;
            }

            self.transition(PassState::Invoking);
            let files: usize = batch.iter().map(|g| g.existing.len()).sum();
            reporter.on_batch_start(index + 1, batch.len(), files);
            let invoked = action.remove(&batch);
            summary.batches += 1;

            // a failed action may still have deleted files
            self.transition(PassState::DetectingRemovals);
            let removed = self.detect_removals(batch, &mut pending)?;
            summary.removed_files += removed;
            reporter.on_batch_complete(index + 1, removed);

            if let Err(e) = invoked {
                warn!("Removal action failed on batch {}: {}", index + 1, e);
                self.apply_confirmed(pending, &mut summary, reporter)?;
                return Err(e.into());
            }

            if self.options.single {
                self.apply(mem::take(&mut pending), &mut summary, reporter)?;
            }
        }

        self.apply(pending, &mut summary, reporter)?;

        self.transition(PassState::Done);
        reporter.on_pass_complete(&summary);
        info!(
            "Resolution finished: {} batches, {} files removed, {} groups merged",
            summary.batches,
            summary.removed_files,
            summary.merges.len()
        );
        Ok(summary)
    }

    /// Apply whatever can still be applied after the pass failed. Groups
    /// without a survivor are skipped rather than failing the rest.
    fn apply_confirmed(
        &mut self,
        pending: BTreeMap<String, PendingMerge>,
        summary: &mut PassSummary,
        reporter: &dyn ProgressReporter,
    ) -> Result<(), Error> {
        let (valid, stranded): (BTreeMap<_, _>, BTreeMap<_, _>) = pending
            .into_iter()
            .partition(|(_, merge)| merge.group.survivor().is_some());
        for (fingerprint, merge) in &stranded {
            warn!(
                "Group {} has no remaining copy; {} taggings left on removed records",
                fingerprint,
                merge.taggings.len()
            );
        }
        self.apply(valid, summary, reporter)
    }

    /// Record every batch member that vanished, along with its taggings.
    fn detect_removals(
        &self,
        batch: Vec<RankedGroup>,
        pending: &mut BTreeMap<String, PendingMerge>,
    ) -> Result<usize, Error> {
        let mut removed_count = 0;

        for group in batch {
            let removed: Vec<PathBuf> = group
                .existing
                .iter()
                .filter(|p| !p.exists())
                .cloned()
                .collect();
            if removed.is_empty() {
                continue;
            }

            let fingerprint = group.fingerprint.clone();
            let merge = pending.entry(fingerprint).or_insert_with(|| PendingMerge {
                group,
                taggings: BTreeSet::new(),
                removed: Vec::new(),
            });

            for path in removed {
                removed_count += 1;
                match self.db.file_id(&path)? {
                    Some(file_id) => {
                        merge.taggings.extend(self.db.taggings_for_file(file_id)?);
                        merge.removed.push((file_id, path));
                    }
                    None => warn!("{} vanished from the catalog mid-pass", path.display()),
                }
            }
        }

        Ok(removed_count)
    }

    /// Commit pending merges. Every group must still have a survivor; this is
    /// verified for all groups before anything is written.
    fn apply(
        &mut self,
        pending: BTreeMap<String, PendingMerge>,
        summary: &mut PassSummary,
        reporter: &dyn ProgressReporter,
    ) -> Result<(), Error> {
        if pending.is_empty() {
            return Ok(());
        }
        self.transition(PassState::Merging);

        let mut plan = Vec::with_capacity(pending.len());
        for (fingerprint, merge) in pending {
            let survivor = match merge.group.survivor() {
                Some(path) => path.to_path_buf(),
                None => {
                    return Err(Error::EmptyGroup {
                        fingerprint,
                        pending: merge.taggings.len(),
                    })
                }
            };
            let survivor_id = self
                .db
                .file_id(&survivor)?
                .ok_or_else(|| Error::NotFound(survivor.clone()))?;
            let other_survivors = merge
                .group
                .members
                .iter()
                .filter(|c| c.path != survivor && c.path.exists())
                .count();
            plan.push((fingerprint, merge, survivor, survivor_id, other_survivors));
        }

        let tx = self.db.connection().unchecked_transaction()?;
        let mut outcomes = Vec::with_capacity(plan.len());
        for (fingerprint, merge, survivor, survivor_id, other_survivors) in plan {
            if other_survivors > 0 {
                if !self.options.merge_multiple_survivors {
                    warn!(
                        "{} copies of group {} remain; leaving its taggings unmerged",
                        other_survivors + 1,
                        fingerprint
                    );
                    summary.deferred.push(fingerprint);
                    continue;
                }
                warn!(
                    "{} copies of group {} remain; merging into best-ranked {}",
                    other_survivors + 1,
                    fingerprint,
                    survivor.display()
                );
            }

            let added = self.db.tag_file(survivor_id, &merge.taggings)?;
            let untagged = merge
                .removed
                .iter()
                .map(|(file_id, path)| self.db.delete_file_taggings(*file_id, path))
                .collect::<Result<Vec<_>, _>>()?;

            debug!(
                "Merged {} taggings from {} removed files into {}",
                merge.taggings.len(),
                untagged.len(),
                survivor.display()
            );
            outcomes.push(MergeOutcome {
                fingerprint,
                survivor,
                added,
                other_survivors,
                untagged,
            });
        }
        tx.commit()?;

        for outcome in &outcomes {
            reporter.on_merge(outcome);
        }
        summary.merges.extend(outcomes);
        Ok(())
    }
}
