//! Builds the runtime pieces every command shares from the configuration.

use std::path::Path;
use std::sync::Arc;

use alm_core::SyncPrefer;
use anyhow::{Context as _, Result};
use remote::HttpRemoteStore;
use storage::SqliteLocalStore;
use sync::SyncDriver;
use tracing::debug;

pub struct AppContext {
    pub local: Arc<SqliteLocalStore>,
    pub driver: SyncDriver,
    /// Conflict preference from the config, used when no flag overrides it.
    pub prefer: SyncPrefer,
}

/// Loads the configuration, opens the SQLite store and wires the driver.
pub async fn build(config_path: Option<&Path>) -> Result<AppContext> {
    let config = match config_path {
        Some(path) => config::load_from(path)?,
        None => config::load()?,
    };
    debug!(
        database = %config.storage.database_path.display(),
        lock = %config.storage.lock_path.display(),
        "Configuration loaded"
    );

    for path in [&config.storage.database_path, &config.storage.lock_path] {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    let local = Arc::new(
        SqliteLocalStore::open(&config.storage.database_path)
            .await
            .with_context(|| {
                format!("opening {}", config.storage.database_path.display())
            })?,
    );
    let remote = Arc::new(HttpRemoteStore::new(
        config.remote.base_url.as_str(),
        config.remote.token.as_str(),
    )?);
    let driver = SyncDriver::new(local.clone(), remote, config.storage.lock_path.clone());

    Ok(AppContext {
        local,
        driver,
        prefer: config.sync.prefer,
    })
}
