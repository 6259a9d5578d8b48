//! Typed configuration for the almanac CLI.
//!
//! Everything here deserializes from the TOML config file with
//! per-section defaults, so a partial file only has to name what it
//! changes. [`crate::loader`] layers `ALMANAC_*` environment overrides
//! on top and validates the result.

use std::path::PathBuf;

use alm_core::SyncPrefer;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level configuration, one section per concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AlmanacConfig {
    #[validate(nested)]
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
}

/// Connection settings for the hosted workspace API.
///
/// Both fields have to be configured before the first sync; the empty
/// defaults fail validation with a pointer at the missing key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the workspace API.
    #[validate(url(message = "remote.base_url must be a full URL"))]
    pub base_url: String,

    /// Bearer token for the integration.
    #[validate(length(min = 1, message = "remote.token must be set"))]
    pub token: String,
}

/// Where the local side of the system lives on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding the entities and remote links.
    pub database_path: PathBuf,

    /// JSON lock file caching remote container ids.
    pub lock_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("almanac");
        Self {
            database_path: base.join("almanac.sqlite3"),
            lock_path: base.join("structure.lock.json"),
        }
    }
}

/// Defaults applied to sync runs when the flags are not given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Which side wins a true conflict.
    pub prefer: SyncPrefer,
}
