pub mod analysis;
pub mod config;
pub mod error;
pub mod hasher;
pub mod progress;
pub mod scanner;
pub mod storage;

pub use analysis::resolution::{PassSummary, Resolver, ResolverOptions};
pub use config::AppConfig;
pub use error::Error;
pub use hasher::Algorithm;
pub use progress::{ProgressReporter, SilentReporter};
