//! # Configuration
//!
//! Typed settings for the almanac CLI: where the SQLite database and the
//! container lock file live, how to reach the hosted workspace API, and
//! the default conflict preference. Loaded from a TOML file with
//! `ALMANAC_*` environment overrides; see [`loader`] for precedence.

pub mod config;
pub mod error;
pub mod loader;

pub use config::{AlmanacConfig, RemoteConfig, StorageConfig, SyncConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::{default_config_path, load, load_from};
