//! Index-addressed CRUD over the config file.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{Config, DatabaseConfig};
use crate::error::{ConfigError, Result};

/// Reads and rewrites one config file.
///
/// Every operation reloads the file, so external edits are picked up. A file
/// that does not exist yet behaves like an empty one.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this store reads and writes.
    pub fn active_path(&self) -> &Path {
        &self.path
    }

    /// Configured databases in file order.
    pub fn list(&self) -> Result<Vec<DatabaseConfig>> {
        Ok(self.load()?.databases)
    }

    /// Appends an entry.
    pub fn create(&self, entry: DatabaseConfig) -> Result<()> {
        let mut config = self.load()?;
        info!(name = %entry.name, "Adding database to config");
        config.databases.push(entry);
        config.save(&self.path)
    }

    /// Replaces the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IndexOutOfRange`] if there is no such entry.
    pub fn update(&self, index: usize, entry: DatabaseConfig) -> Result<()> {
        let mut config = self.load()?;
        let slot = config
            .databases
            .get_mut(index)
            .ok_or(ConfigError::IndexOutOfRange(index))?;
        info!(index, name = %entry.name, "Updating database in config");
        *slot = entry;
        config.save(&self.path)
    }

    /// Removes the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IndexOutOfRange`] if there is no such entry.
    pub fn delete(&self, index: usize) -> Result<()> {
        let mut config = self.load()?;
        if index >= config.databases.len() {
            return Err(ConfigError::IndexOutOfRange(index));
        }
        let removed = config.databases.remove(index);
        info!(index, name = %removed.name, "Removing database from config");
        config.save(&self.path)
    }

    fn load(&self) -> Result<Config> {
        match Config::load(&self.path) {
            Err(ConfigError::IoError(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(Config::default())
            }
            other => other,
        }
    }
}
