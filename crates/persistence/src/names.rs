//! Name pools read from YAML files.

use crate::NamePoolProvider;
use roster_core::{ConfigError, NamePool};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct NameFile {
    #[serde(default)]
    first_names: Vec<String>,
    #[serde(default)]
    last_names: Vec<String>,
}

/// Parse a YAML file with `first_names` and `last_names` lists.
pub fn load_name_file(path: &Path) -> Result<NamePool, ConfigError> {
    let text = fs::read_to_string(path)
        .map_err(|e| ConfigError::Unavailable(format!("{}: {e}", path.display())))?;
    let file: NameFile = serde_yaml::from_str(&text)
        .map_err(|e| ConfigError::Unavailable(format!("{}: {e}", path.display())))?;
    NamePool::new(file.first_names, file.last_names)
}

/// [`NamePoolProvider`] that re-reads a YAML file on every load.
#[derive(Clone, Debug)]
pub struct YamlNamePool {
    path: PathBuf,
}

impl YamlNamePool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NamePoolProvider for YamlNamePool {
    fn load(&self) -> Result<NamePool, ConfigError> {
        load_name_file(&self.path)
    }
}
