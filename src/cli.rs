//! Command line flags.
//!
//! Every alias and environment fallback is resolved here, once, into a
//! [`ServerConfig`]; nothing downstream looks at raw flags.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::{load_or_default, ConfigError, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "devhost", version, about = "Serve a generated static site for local development")]
#[command(disable_help_flag = true)]
pub struct Args {
    /// Print help (`-h` is taken by --ssl)
    #[arg(long, action = ArgAction::Help)]
    #[allow(dead_code)]
    help: Option<bool>,

    /// Config file (defaults to ./devhost.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    pub ip: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long, env = "PORT", allow_negative_numbers = true)]
    pub port: Option<i64>,

    /// Load content once instead of watching for changes
    #[arg(short = 's', long = "static")]
    pub static_mode: bool,

    /// Log requests (dev, tiny, short, common, combined)
    #[arg(short, long, value_name = "FORMAT", num_args = 0..=1, default_missing_value = "dev")]
    pub log: Option<String>,

    /// Open the site in a browser once listening
    #[arg(short, long)]
    pub open: bool,

    /// Path prefix to forward to the proxy upstream
    #[arg(short = 'P', long, env = "PROXY_PATH")]
    pub proxy_path: Option<String>,

    /// Upstream the proxy prefix is forwarded to
    #[arg(short = 'U', long, env = "PROXY_URL")]
    pub proxy_url: Option<String>,

    /// Serve HTTPS with a locally-trusted certificate
    #[arg(short = 'h', long)]
    pub ssl: bool,

    /// Certificate file (PEM)
    #[arg(short, long, value_name = "PATH")]
    pub cert: Option<PathBuf>,

    /// Private key file (PEM)
    #[arg(long, alias = "ck", value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Extra hostname for the provisioned certificate (repeatable)
    #[arg(long = "host", value_name = "HOST")]
    pub hosts: Vec<String>,

    /// URL root the site is mounted under
    #[arg(long)]
    pub root: Option<String>,

    /// Directory the site is loaded from
    #[arg(long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Extra directory served from disk when the site has no match
    #[arg(long, value_name = "DIR")]
    pub static_dir: Option<PathBuf>,

    /// Gzip responses on the fly
    #[arg(long)]
    pub compress: bool,

    /// Do not send X-Powered-By
    #[arg(long)]
    pub no_header: bool,

    /// Serve .br/.gz siblings to clients that accept them
    #[arg(long)]
    pub pre_compressed: bool,

    /// Cache hot responses, up to this many bytes
    #[arg(long, value_name = "BYTES", num_args = 0..=1, default_missing_value = DEFAULT_CACHE_CAPACITY_STR)]
    pub cache: Option<u64>,

    /// Regex selecting cacheable paths
    #[arg(long, value_name = "REGEX")]
    pub cache_filter: Option<String>,
}

const DEFAULT_CACHE_CAPACITY_STR: &str = "10485760";

impl Args {
    /// Load the config file, then let flags override it.
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = load_or_default(self.config.as_deref())?;
        self.apply(&mut config);
        Ok(config)
    }

    /// Overlay the flags that were given onto `config`.
    pub fn apply(self, config: &mut ServerConfig) {
        let server = &mut config.server;
        if let Some(ip) = self.ip {
            server.ip = Some(ip);
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(root) = self.root {
            server.root = root;
        }
        if let Some(source) = self.source {
            server.source_dir = source;
        }
        if self.static_dir.is_some() {
            server.static_dir = self.static_dir;
        }
        if self.log.is_some() {
            server.log = self.log;
        }
        server.static_mode |= self.static_mode;
        server.open |= self.open;
        server.compress |= self.compress;
        server.pre_compressed |= self.pre_compressed;
        if self.no_header {
            server.header = false;
        }

        if let Some(capacity) = self.cache {
            config.cache.capacity = capacity;
        }
        if let Some(filter) = self.cache_filter {
            config.cache.filter = filter;
        }

        if self.proxy_path.is_some() {
            config.proxy.path = self.proxy_path;
        }
        if self.proxy_url.is_some() {
            config.proxy.url = self.proxy_url;
        }

        config.tls.ssl |= self.ssl;
        if self.cert.is_some() {
            config.tls.cert = self.cert;
        }
        if self.key.is_some() {
            config.tls.key = self.key;
        }
        config.tls.hosts.extend(self.hosts);
    }
}
