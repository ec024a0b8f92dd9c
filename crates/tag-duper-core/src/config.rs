use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Environment variable TMSU itself consults for the database location.
pub const DB_ENV_VAR: &str = "TMSU_DB";

pub const DEFAULT_MINIMUM: usize = 2;
pub const DEFAULT_BATCH_LIMIT: usize = 300;
pub const DEFAULT_STDIN_BATCH_LIMIT: usize = 65535;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub dupes: DupesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DupesConfig {
    /// Removal command used when `dupes` is run without `--command`.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_minimum")]
    pub minimum: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_stdin_limit")]
    pub stdin_limit: usize,
}

impl Default for DupesConfig {
    fn default() -> Self {
        Self {
            command: None,
            minimum: DEFAULT_MINIMUM,
            limit: DEFAULT_BATCH_LIMIT,
            stdin_limit: DEFAULT_STDIN_BATCH_LIMIT,
        }
    }
}

fn default_minimum() -> usize {
    DEFAULT_MINIMUM
}

fn default_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}

fn default_stdin_limit() -> usize {
    DEFAULT_STDIN_BATCH_LIMIT
}

/// Load `Config.{toml,json,...}` from the working directory (optional),
/// overlaid with `TAG_DUPER_*` environment variables (`TAG_DUPER_DUPES__LIMIT=50`).
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("TAG_DUPER").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

impl AppConfig {
    /// Pick the catalog database: explicit flag, then config, then `TMSU_DB`,
    /// then `~/.tmsu/default.db`.
    pub fn database_path(&self, explicit: Option<&str>) -> PathBuf {
        resolve_database_path(
            explicit.or(self.database.as_deref()),
            env::var(DB_ENV_VAR).ok().as_deref(),
        )
    }
}

pub fn resolve_database_path(nominal: Option<&str>, env_value: Option<&str>) -> PathBuf {
    if let Some(path) = nominal.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    if let Some(path) = env_value.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_default()
        .join(".tmsu")
        .join("default.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_database_path(Some("/tmp/a.db"), Some("/tmp/b.db"));
        assert_eq!(path, PathBuf::from("/tmp/a.db"));
    }

    #[test]
    fn test_env_path_used_when_no_explicit() {
        let path = resolve_database_path(None, Some("/tmp/b.db"));
        assert_eq!(path, PathBuf::from("/tmp/b.db"));

        let path = resolve_database_path(Some(""), Some("/tmp/b.db"));
        assert_eq!(path, PathBuf::from("/tmp/b.db"));
    }

    #[test]
    fn test_falls_back_to_home_default() {
        let path = resolve_database_path(None, None);
        assert!(path.ends_with(".tmsu/default.db"));
    }

    #[test]
    fn test_dupes_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.dupes.minimum, 2);
        assert_eq!(config.dupes.limit, 300);
        assert_eq!(config.dupes.stdin_limit, 65535);
        assert!(config.dupes.command.is_none());
    }
}
