use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tag-duper")]
#[command(about = "Find and resolve duplicate files in a TMSU catalog", long_about = None)]
pub struct Cli {
    /// Catalog database (defaults to $TMSU_DB, then ~/.tmsu/default.db)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report catalog entries that no longer match the filesystem
    Check {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the fingerprint and mtime the catalog would store for paths
    Update {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Resolve duplicate groups, moving taggings onto the surviving copy
    Dupes(DupesArgs),
    /// Point the record for OLD at NEW
    Repair {
        old: PathBuf,
        new: PathBuf,
        /// Accept NEW even if its fingerprint differs from the record
        #[arg(long)]
        ignore_fingerprint: bool,
    },
    /// Recompute fingerprints of stale and invalidated entries
    Rehash,
    /// Show the fingerprint algorithm, or switch to another one
    Algorithm {
        name: Option<String>,
    },
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("action").args(["keep_highest", "command", "stats"])))]
pub struct DupesArgs {
    /// Delete every copy except the best-ranked one
    #[arg(long)]
    pub keep_highest: bool,

    /// Shell command run on each batch of duplicate paths
    #[arg(short, long)]
    pub command: Option<String>,

    /// Only report duplicate statistics
    #[arg(long)]
    pub stats: bool,

    /// Present one group per command invocation
    #[arg(long)]
    pub single: bool,

    /// Pass paths on the command's stdin instead of as arguments
    #[arg(long)]
    pub stdin: bool,

    /// Skip groups with fewer existing copies
    #[arg(long)]
    pub minimum: Option<usize>,

    /// Maximum paths per command invocation
    #[arg(long)]
    pub limit: Option<usize>,

    /// Merge into the best-ranked copy even when several copies remain
    #[arg(long)]
    pub merge_multiple_survivors: bool,
}
