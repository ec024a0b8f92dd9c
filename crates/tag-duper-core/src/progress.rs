use crate::analysis::resolution::{MergeOutcome, PassSummary};

/// Trait for reporting progress of fingerprint refreshes and resolution passes.
///
/// The CLI implements it with indicatif/colored output.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_hash_start(&self, _total_files: usize) {}
    fn on_hash_progress(&self, _files_hashed: usize, _total_files: usize) {}
    fn on_hash_complete(&self, _updated: usize, _duration_secs: f64) {}
    fn on_pass_start(&self, _groups: usize, _files: usize) {}
    fn on_batch_start(&self, _batch: usize, _groups: usize, _files: usize) {}
    fn on_batch_complete(&self, _batch: usize, _removed: usize) {}
    fn on_merge(&self, _outcome: &MergeOutcome) {}
    fn on_pass_complete(&self, _summary: &PassSummary) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
