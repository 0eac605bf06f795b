//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::validate_config;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "devhost.toml";

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Port number {port} is invalid. Try a number between 1 and 65535.")]
    InvalidPort { port: i64 },

    #[error("invalid root `{0}`: must start and end with `/`")]
    InvalidRoot(String),

    #[error("invalid proxy configuration: {0}")]
    InvalidProxy(String),

    #[error("invalid cache filter `{pattern}`: {source}")]
    InvalidCacheFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ConfigError>),
}

impl ConfigError {
    /// Stable error code for callers that classify startup failures.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::InvalidPort { .. } => "ERR_OUT_OF_RANGE",
            _ => "ERR_INVALID_CONFIG",
        }
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ServerConfig = toml::from_str(&content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Load `path` if given, else the default file if it exists, else defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                tracing::debug!(path = ?default, "Loading default config file");
                load_config(default)
            } else {
                Ok(ServerConfig::default())
            }
        }
    }
}
