//! The on-disk config file and where it lives.
//!
//! # Example TOML
//!
//! ```toml
//! [[databases]]
//! name = "local"
//! db_path = "/home/me/app.db"
//!
//! [[databases]]
//! name = "fixtures"
//! db_path = "/home/me/fixtures.sqlite"
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

const CONFIG_DIR_NAME: &str = ".config";
const APP_DIR_NAME: &str = "dbc";
const CONFIG_FILE_NAME: &str = "config.toml";

/// One named database connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    #[serde(rename = "db_path")]
    pub path: String,
}

impl DatabaseConfig {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Checks that name and path are not blank.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingDatabaseName`] or
    /// [`ConfigError::MissingDatabasePath`].
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseName);
        }
        if self.path.trim().is_empty() {
            return Err(ConfigError::MissingDatabasePath);
        }
        Ok(())
    }
}

/// Contents of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

impl Config {
    /// Parses and validates TOML text.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbc_config::Config;
    ///
    /// let config = Config::from_toml_str(
    ///     "[[databases]]\nname = \"local\"\ndb_path = \"/tmp/app.db\"\n",
    /// )
    /// .unwrap();
    /// assert_eq!(config.databases[0].path, "/tmp/app.db");
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Every entry must have a name and a path.
    pub fn validate(&self) -> Result<()> {
        self.databases.iter().try_for_each(DatabaseConfig::validate)
    }

    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ConfigError::IoError) if the file cannot be read,
    /// [`TomlError`](ConfigError::TomlError) if parsing fails, or a validation
    /// error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validates and writes the config.
    ///
    /// The file is written to a temporary file in the same directory and then
    /// renamed over the target, so readers never see a partial file. Missing
    /// parent directories are created.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let text = toml::to_string(self)?;
        let mut file = tempfile::Builder::new()
            .prefix(".config.")
            .suffix(".toml")
            .tempfile_in(dir)?;
        file.write_all(text.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|err| ConfigError::IoError(err.error))?;

        debug!(path = %path.display(), databases = self.databases.len(), "Wrote config");
        Ok(())
    }
}

/// `<home>/.config/dbc/config.toml`.
pub fn path_from_home(home: impl AsRef<Path>) -> PathBuf {
    home.as_ref()
        .join(CONFIG_DIR_NAME)
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// Config path for an operating system name as reported by
/// [`std::env::consts::OS`].
///
/// On Windows the file lives under `%APPDATA%\dbc`, falling back to
/// `<home>\AppData\Roaming` when `APPDATA` is blank; everywhere else under
/// `<home>/.config/dbc`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use dbc_config::resolve_path_for_os;
///
/// assert_eq!(
///     resolve_path_for_os("linux", "/home/me", ""),
///     Path::new("/home/me/.config/dbc/config.toml")
/// );
/// ```
pub fn resolve_path_for_os(os: &str, home: impl AsRef<Path>, app_data: &str) -> PathBuf {
    if os == "windows" {
        let base = match app_data.trim() {
            "" => home.as_ref().join("AppData").join("Roaming"),
            app_data => PathBuf::from(app_data),
        };
        return base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME);
    }
    path_from_home(home)
}

/// Default config path for the current user.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if the home directory is unknown.
pub fn default_path() -> Result<PathBuf> {
    let home = ["HOME", "USERPROFILE"]
        .into_iter()
        .filter_map(std::env::var_os)
        .find(|value| !value.is_empty())
        .ok_or(ConfigError::NoHomeDirectory)?;
    let app_data = std::env::var("APPDATA").unwrap_or_default();
    Ok(resolve_path_for_os(std::env::consts::OS, home, &app_data))
}
