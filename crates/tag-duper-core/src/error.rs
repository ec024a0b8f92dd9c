use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Unknown fingerprinting algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("A catalog record for {} already exists", .0.display())]
    Conflict(PathBuf),

    #[error("Integrity mismatch for {}: {detail}", path.display())]
    IntegrityMismatch { path: PathBuf, detail: String },

    #[error("Every member of duplicate group {fingerprint} was removed; refusing to drop {pending} pending tagging(s)")]
    EmptyGroup { fingerprint: String, pending: usize },

    #[error("{0}")]
    Other(String),
}
