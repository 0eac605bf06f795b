//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the mount root and proxy settings are well formed
//! - Compile the cache filter once so bad patterns fail at startup
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Port range is checked by `BindAddress::new` right before binding
//! - Runs before config is accepted into the system

use regex::Regex;
use url::Url;

use crate::config::loader::ConfigError;
use crate::config::schema::ServerConfig;

/// Validate a loaded configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let root = &config.server.root;
    if !root.starts_with('/') || !root.ends_with('/') {
        errors.push(ConfigError::InvalidRoot(root.clone()));
    }

    if let Some(path) = &config.proxy.path {
        if !path.starts_with('/') {
            errors.push(ConfigError::InvalidProxy(format!(
                "path `{path}` must start with `/`"
            )));
        }
    }

    if let Some(raw) = &config.proxy.url {
        match Url::parse(raw) {
            Ok(url) if url.scheme() == "http" && url.has_host() => {}
            Ok(url) => errors.push(ConfigError::InvalidProxy(format!(
                "url `{raw}` must be an absolute http URL (got scheme `{}`)",
                url.scheme()
            ))),
            Err(e) => errors.push(ConfigError::InvalidProxy(format!("url `{raw}`: {e}"))),
        }
    }

    if let Err(source) = Regex::new(&config.cache.filter) {
        errors.push(ConfigError::InvalidCacheFilter {
            pattern: config.cache.filter.clone(),
            source,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}
