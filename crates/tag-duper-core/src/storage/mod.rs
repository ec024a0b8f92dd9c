pub mod models;
pub mod queries;
pub mod sqlite;

pub use queries::split_path;
pub use sqlite::Database;
