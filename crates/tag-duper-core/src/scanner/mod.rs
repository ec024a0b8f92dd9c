pub mod mtime;
pub mod staleness;

pub use mtime::{canonical_mtime, normalize_mtime};
pub use staleness::{
    changed_paths, classify, classify_entries, invalidated_paths, unknown_paths, ChangeCounts,
    ChangeFlags, ChangeReport, LiveState,
};
