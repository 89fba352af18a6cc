//! Runtime configuration: YAML file first, then environment overrides.

use persistence::{default_sqlite_url, IdentityReturn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::DEFAULT_BATCH_SIZE;

pub const ENV_DATABASE_URL: &str = "ROSTER_DATABASE_URL";
pub const ENV_BATCH_SIZE: &str = "ROSTER_BATCH_SIZE";
pub const ENV_NAMES_FILE: &str = "ROSTER_NAMES_FILE";
pub const ENV_IDENTITY_RETURN: &str = "ROSTER_IDENTITY_RETURN";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// SQLite URL for players and name tables.
    pub database_url: String,
    /// Rows per flush in bulk mode.
    pub batch_size: usize,
    /// YAML name pool; when unset names come from the database.
    pub names_file: Option<PathBuf>,
    pub identity_return: IdentityReturn,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            database_url: default_sqlite_url().to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            names_file: None,
            identity_return: IdentityReturn::Ids,
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
    #[error("batch_size must be > 0")]
    InvalidBatchSize,
}

impl RuntimeConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, RuntimeConfigError> {
        let cfg: RuntimeConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read `path` (if given), then apply `ROSTER_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, RuntimeConfigError> {
        Self::load_with(path, std::env::vars())
    }

    /// [`RuntimeConfig::load`] with an explicit variable source.
    pub fn load_with<I>(path: Option<&Path>, vars: I) -> Result<Self, RuntimeConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut cfg = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| RuntimeConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_yaml::from_str(&text)?
            }
            None => RuntimeConfig::default(),
        };
        cfg.apply_overrides(vars)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `ROSTER_*` variables from `vars`; unrelated variables are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), RuntimeConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                ENV_DATABASE_URL => self.database_url = value,
                ENV_BATCH_SIZE => {
                    self.batch_size = value.trim().parse().map_err(|_| RuntimeConfigError::Env {
                        var: ENV_BATCH_SIZE,
                        value: value.clone(),
                    })?;
                }
                ENV_NAMES_FILE => self.names_file = Some(PathBuf::from(value)),
                ENV_IDENTITY_RETURN => {
                    self.identity_return = match value.trim() {
                        "ids" => IdentityReturn::Ids,
                        "affected_count" => IdentityReturn::AffectedCount,
                        _ => {
                            return Err(RuntimeConfigError::Env {
                                var: ENV_IDENTITY_RETURN,
                                value,
                            })
                        }
                    };
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), RuntimeConfigError> {
        if self.batch_size == 0 {
            return Err(RuntimeConfigError::InvalidBatchSize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.batch_size, 100);
        assert!(cfg.database_url.starts_with("sqlite://"));
        assert_eq!(cfg.identity_return, IdentityReturn::Ids);
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let cfg = RuntimeConfig::from_yaml_str("batch_size: 25\nnames_file: names.yaml\n").unwrap();
        assert_eq!(cfg.batch_size, 25);
        assert_eq!(cfg.names_file, Some(PathBuf::from("names.yaml")));
        assert_eq!(cfg.database_url, default_sqlite_url());
    }

    #[test]
    fn yaml_rejects_unknown_and_zero_batch() {
        assert!(RuntimeConfig::from_yaml_str("batch_sise: 3\n").is_err());
        assert!(matches!(
            RuntimeConfig::from_yaml_str("batch_size: 0\n"),
            Err(RuntimeConfigError::InvalidBatchSize)
        ));
    }

    #[test]
    fn env_overrides_win() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(vars(&[
            ("ROSTER_DATABASE_URL", "sqlite::memory:"),
            ("ROSTER_BATCH_SIZE", " 7 "),
            ("ROSTER_IDENTITY_RETURN", "affected_count"),
            ("PATH", "/usr/bin"),
        ]))
        .unwrap();
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.batch_size, 7);
        assert_eq!(cfg.identity_return, IdentityReturn::AffectedCount);
    }

    #[test]
    fn bad_env_value_names_the_variable() {
        let mut cfg = RuntimeConfig::default();
        let err = cfg
            .apply_overrides(vars(&[("ROSTER_BATCH_SIZE", "lots")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value for ROSTER_BATCH_SIZE: \"lots\"");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.yaml");
        fs::write(&path, "database_url: sqlite://./tmp/x.db\nidentity_return: affected_count\n")
            .unwrap();
        let cfg =
            RuntimeConfig::load_with(Some(&path), vars(&[("ROSTER_BATCH_SIZE", "9")])).unwrap();
        assert_eq!(cfg.database_url, "sqlite://./tmp/x.db");
        assert_eq!(cfg.identity_return, IdentityReturn::AffectedCount);
        assert_eq!(cfg.batch_size, 9);
        assert!(matches!(
            RuntimeConfig::load_with(Some(&dir.path().join("missing.yaml")), Vec::new()),
            Err(RuntimeConfigError::Io { .. })
        ));
    }
}
