pub mod actions;
pub mod duplicates;
pub mod ranking;
pub mod repair;
pub mod resolution;

pub use actions::{ExternalCommand, KeepHighest, RemovalAction};
pub use duplicates::{duplicate_stats, duplicated_paths, DuplicateMap, DuplicateStats};
pub use repair::{
    change_fingerprint_algorithm, preview_update, refresh_fingerprints, repair_path, LiveRecord,
    RefreshSummary,
};
pub use resolution::{MergeOutcome, PassState, PassSummary, RankedGroup, Resolver, ResolverOptions};
