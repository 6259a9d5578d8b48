//! Loads the configuration file and layers environment overrides on top.
//!
//! Precedence, lowest to highest: built-in defaults, the TOML file,
//! `ALMANAC_*` environment variables. A missing file is not an error;
//! the CLI has to be usable from environment variables alone.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;
use validator::Validate;

use crate::config::AlmanacConfig;
use crate::error::{ConfigError, ConfigResult};

/// Recognized environment overrides.
pub const ENV_CONFIG_PATH: &str = "ALMANAC_CONFIG";
pub const ENV_REMOTE_BASE_URL: &str = "ALMANAC_REMOTE_BASE_URL";
pub const ENV_REMOTE_TOKEN: &str = "ALMANAC_REMOTE_TOKEN";
pub const ENV_DATABASE_PATH: &str = "ALMANAC_DATABASE_PATH";
pub const ENV_LOCK_PATH: &str = "ALMANAC_LOCK_PATH";
pub const ENV_SYNC_PREFER: &str = "ALMANAC_SYNC_PREFER";

/// Loads from `$ALMANAC_CONFIG`, falling back to the per-user default
/// path, and validates the result.
pub fn load() -> ConfigResult<AlmanacConfig> {
    let path = match env::var_os(ENV_CONFIG_PATH) {
        Some(path) => PathBuf::from(path),
        None => default_config_path()?,
    };
    load_from(&path)
}

/// Loads from an explicit path. The file may be absent.
pub fn load_from(path: &Path) -> ConfigResult<AlmanacConfig> {
    let mut config = read_file(path)?;
    apply_env(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// `<user config dir>/almanac/config.toml`.
pub fn default_config_path() -> ConfigResult<PathBuf> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("almanac").join("config.toml"))
}

fn read_file(path: &Path) -> ConfigResult<AlmanacConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file; starting from defaults");
            return Ok(AlmanacConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env(config: &mut AlmanacConfig) -> ConfigResult<()> {
    if let Ok(url) = env::var(ENV_REMOTE_BASE_URL) {
        config.remote.base_url = url;
    }
    if let Ok(token) = env::var(ENV_REMOTE_TOKEN) {
        config.remote.token = token;
    }
    if let Some(path) = env::var_os(ENV_DATABASE_PATH) {
        config.storage.database_path = path.into();
    }
    if let Some(path) = env::var_os(ENV_LOCK_PATH) {
        config.storage.lock_path = path.into();
    }
    if let Ok(prefer) = env::var(ENV_SYNC_PREFER) {
        config.sync.prefer = prefer.parse().map_err(|_| ConfigError::Env {
            key: ENV_SYNC_PREFER,
            detail: format!("{prefer:?} is not a sync preference (remote or local)"),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alm_core::SyncPrefer;
    use serial_test::serial;

    fn clear_env() {
        unsafe {
            env::remove_var(ENV_CONFIG_PATH);
            env::remove_var(ENV_REMOTE_BASE_URL);
            env::remove_var(ENV_REMOTE_TOKEN);
            env::remove_var(ENV_DATABASE_PATH);
            env::remove_var(ENV_LOCK_PATH);
            env::remove_var(ENV_SYNC_PREFER);
        }
    }

    #[test]
    #[serial]
    fn test_loads_a_complete_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [remote]
            base_url = "https://api.example.com"
            token = "secret"

            [storage]
            database_path = "/tmp/almanac.sqlite3"
            lock_path = "/tmp/structure.lock.json"

            [sync]
            prefer = "local"
            "#,
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.remote.base_url, "https://api.example.com");
        assert_eq!(config.remote.token, "secret");
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/almanac.sqlite3"));
        assert_eq!(config.sync.prefer, SyncPrefer::Local);
    }

    #[test]
    #[serial]
    fn test_env_overrides_win_over_the_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [remote]
            base_url = "https://api.example.com"
            token = "from-file"
            "#,
        )
        .unwrap();

        unsafe {
            env::set_var(ENV_REMOTE_TOKEN, "from-env");
            env::set_var(ENV_SYNC_PREFER, "local");
        }
        let config = load_from(&path).unwrap();
        assert_eq!(config.remote.token, "from-env");
        assert_eq!(config.sync.prefer, SyncPrefer::Local);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_a_missing_file_is_fine_when_env_fills_the_gaps() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            env::set_var(ENV_REMOTE_BASE_URL, "https://api.example.com");
            env::set_var(ENV_REMOTE_TOKEN, "secret");
        }
        let config = load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.remote.base_url, "https://api.example.com");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_an_unconfigured_remote_fails_validation() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let err = load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    #[serial]
    fn test_a_bad_prefer_override_is_reported_with_its_key() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            env::set_var(ENV_REMOTE_BASE_URL, "https://api.example.com");
            env::set_var(ENV_REMOTE_TOKEN, "secret");
            env::set_var(ENV_SYNC_PREFER, "upstream");
        }
        let err = load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains(ENV_SYNC_PREFER));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_malformed_toml_is_a_parse_error() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[remote\nbase_url = ").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
