//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::net::IpAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default byte budget used when caching is switched on without a size.
pub const DEFAULT_CACHE_CAPACITY: u64 = 10 * 1024 * 1024;

/// Default cache eligibility pattern (stylesheets and scripts).
pub const DEFAULT_CACHE_FILTER: &str = r"\.(css|js)$";

/// Root configuration for the development server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener and routing behavior.
    pub server: ServeConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Upstream proxy settings.
    pub proxy: ProxyConfig,

    /// HTTPS settings.
    pub tls: TlsConfig,
}

/// Listener and routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Bind address; `None` binds every interface.
    pub ip: Option<IpAddr>,

    /// Listening port. Signed so out-of-range input reaches validation.
    pub port: i64,

    /// URL root the site is mounted under (e.g. "/" or "/blog/").
    pub root: String,

    /// Request log format, `None` disables request logging.
    pub log: Option<String>,

    /// Gzip responses on the fly.
    pub compress: bool,

    /// Send the `X-Powered-By` header.
    pub header: bool,

    /// Open the server URL in a browser once listening.
    pub open: bool,

    /// Load content once instead of watching for changes.
    pub static_mode: bool,

    /// Serve `.br` / `.gz` siblings when the client accepts them.
    pub pre_compressed: bool,

    /// Keep `.html` URLs as-is; `false` redirects them to the extensionless form.
    pub trailing_html: bool,

    /// Keep `/index.html` URLs as-is; `false` redirects them to `/`.
    pub trailing_index: bool,

    /// Use 301 instead of 302 for folder redirects.
    pub redirect_permanent: bool,

    /// Directory the generated site is loaded from.
    pub source_dir: PathBuf,

    /// Extra directory served from disk after the route table misses.
    pub static_dir: Option<PathBuf>,

    /// Debounce window for filesystem change bursts.
    pub watch_debounce_ms: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            ip: None,
            port: 4000,
            root: "/".to_string(),
            log: None,
            compress: false,
            header: true,
            open: false,
            static_mode: false,
            pre_compressed: false,
            trailing_html: true,
            trailing_index: true,
            redirect_permanent: false,
            source_dir: PathBuf::from("public"),
            static_dir: None,
            watch_debounce_ms: 200,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Byte budget; 0 disables caching.
    pub capacity: u64,

    /// Regex selecting which normalized URLs may be cached.
    pub filter: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            filter: DEFAULT_CACHE_FILTER.to_string(),
        }
    }
}

/// Upstream proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Path prefix to forward (e.g. "/api").
    pub path: Option<String>,

    /// Upstream origin (e.g. "http://127.0.0.1:3000").
    pub url: Option<String>,
}

impl ProxyConfig {
    /// Both halves must be present for the proxy stage to mount.
    pub fn is_enabled(&self) -> bool {
        self.path.is_some() && self.url.is_some()
    }
}

/// HTTPS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Serve HTTPS with a locally-trusted certificate.
    pub ssl: bool,

    /// Path to certificate file (PEM).
    pub cert: Option<PathBuf>,

    /// Path to private key file (PEM).
    pub key: Option<PathBuf>,

    /// Hostnames added to the default certificate host set.
    pub hosts: Vec<String>,

    /// Where the generator binary and issued certificates are cached.
    pub cache_dir: PathBuf,

    /// Release tag of the certificate generator.
    pub mkcert_version: String,

    /// Base URL the generator release artifacts are downloaded from.
    pub download_base: String,
}

impl TlsConfig {
    /// HTTPS is selected by any TLS-related setting.
    pub fn is_enabled(&self) -> bool {
        self.ssl || self.cert.is_some() || self.key.is_some()
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            ssl: false,
            cert: None,
            key: None,
            hosts: Vec::new(),
            cache_dir: PathBuf::from(".cache/devhost-certificates"),
            mkcert_version: "v1.4.4".to_string(),
            download_base: "https://github.com/FiloSottile/mkcert/releases/download".to_string(),
        }
    }
}
