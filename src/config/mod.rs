//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! devhost.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → cli.rs overrides (flags, aliases, env fallbacks)
//!     → ServerConfig (validated, immutable)
//!     → passed by value into each component constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the server starts
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{CacheConfig, ProxyConfig, ServeConfig, ServerConfig, TlsConfig};
