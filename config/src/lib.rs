//! Named SQLite connections for the dbc row editor.
//!
//! The config is a small TOML file listing databases by name and path. This
//! crate reads and atomically rewrites it, resolves its default location, and
//! provides the management operations the CLI exposes.
//!
//! # Quick start
//!
//! ```no_run
//! use dbc_config::{ConfigStore, create_database, default_path};
//!
//! let store = ConfigStore::new(default_path().unwrap());
//! create_database(&store, "local", "/home/me/app.db", |_path| Ok::<(), String>(())).unwrap();
//!
//! for (i, db) in store.list().unwrap().iter().enumerate() {
//!     println!("{}. {} ({})", i + 1, db.name, db.path);
//! }
//! ```

mod config;
mod error;
mod manage;
mod store;

pub use config::{Config, DatabaseConfig, default_path, path_from_home, resolve_path_for_os};
pub use error::{ConfigError, Result};
pub use manage::{create_database, delete_database, normalize_entry, update_database};
pub use store::ConfigStore;
