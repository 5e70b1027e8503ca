//! Config management as the user drives it: trimmed input, a connection
//! check before anything is written, and index-based edits.

use std::fmt::Display;
use std::path::Path;

use crate::config::DatabaseConfig;
use crate::error::{ConfigError, Result};
use crate::store::ConfigStore;

/// Trims user input into an entry.
///
/// # Errors
///
/// Returns [`ConfigError::MissingDatabaseName`] or
/// [`ConfigError::MissingDatabasePath`] for blank input.
pub fn normalize_entry(name: &str, path: &str) -> Result<DatabaseConfig> {
    let entry = DatabaseConfig::new(name.trim(), path.trim());
    entry.validate()?;
    Ok(entry)
}

/// Adds a database after `check` confirms it can be opened.
///
/// # Errors
///
/// Returns validation errors, [`ConfigError::ConnectionFailed`] carrying the
/// check's message, or a store failure. Nothing is written on error.
pub fn create_database<F, E>(store: &ConfigStore, name: &str, path: &str, check: F) -> Result<()>
where
    F: FnOnce(&Path) -> std::result::Result<(), E>,
    E: Display,
{
    let entry = normalize_entry(name, path)?;
    check(Path::new(&entry.path)).map_err(|err| ConfigError::ConnectionFailed(err.to_string()))?;
    store.create(entry)
}

/// Replaces the database at `index` after `check` confirms the new path.
///
/// # Errors
///
/// Same as [`create_database`], plus [`ConfigError::IndexOutOfRange`].
pub fn update_database<F, E>(
    store: &ConfigStore,
    index: usize,
    name: &str,
    path: &str,
    check: F,
) -> Result<()>
where
    F: FnOnce(&Path) -> std::result::Result<(), E>,
    E: Display,
{
    let entry = normalize_entry(name, path)?;
    check(Path::new(&entry.path)).map_err(|err| ConfigError::ConnectionFailed(err.to_string()))?;
    store.update(index, entry)
}

/// Removes the database at `index`.
pub fn delete_database(store: &ConfigStore, index: usize) -> Result<()> {
    store.delete(index)
}
