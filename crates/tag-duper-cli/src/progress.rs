use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use tag_duper_core::analysis::{MergeOutcome, PassSummary};
use tag_duper_core::ProgressReporter;

/// CLI progress reporter.
///
/// - Rehash: progress bar (total known up front)
/// - Resolution: one status line per batch and per merge
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_hash_start(&self, total_files: usize) {
        let pb = ProgressBar::new(total_files as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "  {spinner:.cyan} Hashing [{bar:30.cyan/dim}] {pos}/{len} files ({eta} remaining)",
        ) {
            pb.set_style(style.progress_chars("━╸─").tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_hash_progress(&self, files_hashed: usize, _total_files: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_position(files_hashed as u64);
            }
        }
    }

    fn on_hash_complete(&self, updated: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Rehash complete: {} fingerprints updated in {:.2}s",
            "✓".green(),
            updated,
            duration_secs
        );
    }

    fn on_pass_start(&self, groups: usize, files: usize) {
        eprintln!(
            "  {} duplicate groups, {} files",
            groups.to_string().red(),
            files.to_string().red()
        );
    }

    fn on_batch_start(&self, batch: usize, groups: usize, files: usize) {
        eprintln!(
            "  {} Batch {}: {} groups, {} files",
            "→".cyan(),
            batch,
            groups,
            files
        );
    }

    fn on_batch_complete(&self, batch: usize, removed: usize) {
        eprintln!(
            "  {} Batch {}: {} files removed",
            "✓".green(),
            batch,
            removed
        );
    }

    fn on_merge(&self, outcome: &MergeOutcome) {
        let line = format!(
            "    {} taggings from {} removed copies -> {}",
            outcome.added,
            outcome.untagged.len(),
            outcome.survivor.display()
        );
        if outcome.other_survivors > 0 {
            eprintln!("{} ({} other copies remain)", line.yellow(), outcome.other_survivors);
        } else {
            eprintln!("{}", line);
        }
    }

    fn on_pass_complete(&self, summary: &PassSummary) {
        let status = if summary.cancelled {
            "cancelled".yellow()
        } else {
            "complete".green()
        };
        eprintln!(
            "  Resolution {}: {} batches, {} files removed, {} groups merged",
            status,
            summary.batches,
            summary.removed_files,
            summary.merges.len()
        );
        if !summary.deferred.is_empty() {
            eprintln!(
                "  {} groups left unmerged with several copies remaining",
                summary.deferred.len().to_string().yellow()
            );
        }
    }
}
