//! Error types for the connection store.

use thiserror::Error;

/// Errors that can occur while reading or changing the connection store.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The config could not be serialized.
    #[error("TOML serialization error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    /// A database entry has a blank name.
    #[error("database name is required")]
    MissingDatabaseName,

    /// A database entry has a blank path.
    #[error("database path is required")]
    MissingDatabasePath,

    /// No database entry at this index.
    #[error("database index {0} out of range")]
    IndexOutOfRange(usize),

    /// The connection check for a new or edited entry failed.
    #[error("database connection failed: {0}")]
    ConnectionFailed(String),

    /// Neither `HOME` nor `USERPROFILE` is set.
    #[error("cannot determine home directory")]
    NoHomeDirectory,
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
