use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("environment override {key} is invalid: {detail}")]
    Env { key: &'static str, detail: String },

    #[error("no per-user config directory on this platform; set ALMANAC_CONFIG")]
    NoConfigDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
