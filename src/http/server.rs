//! Server bootstrap.
//!
//! # Responsibilities
//! - Validate the port and probe it before doing anything expensive
//! - Decide HTTP vs HTTPS, provisioning a certificate when asked
//! - Wire the pipeline and its tower layers
//! - Load site content once, or keep it fresh with a watcher
//! - Bind, serve, and report the URL
//!
//! # Design Decisions
//! - Port range errors surface before any socket or filesystem work
//! - Certificate trouble degrades to HTTP; explicit cert/key files that
//!   cannot be loaded are fatal
//! - Closing is idempotent and forcibly drops open connections

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::certs::{CertificateError, CertificateProvisioner};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, ServerConfig};
use crate::http::middleware::{LogFormat, Logger, ProxyStage, RootRedirect, RouteStage, StaticStage};
use crate::http::pipeline::Pipeline;
use crate::lifecycle::startup::{self, ContentMode, Phase};
use crate::lifecycle::{browser, ShutdownSignal};
use crate::net::tls::load_tls_config;
use crate::net::{check_port, format_address, BindAddress, BindError, Listener};
use crate::routing::{ResolveOptions, Resolver, ResponseCache};
use crate::site::{rebuild, DirectoryGenerator, MemoryRouteTable, RebuildNotifier, RouteTable, SiteGenerator, SiteWatcher};

const POWERED_BY: &str = "devhost";

type StartedHook = Box<dyn Fn(&str) + Send + Sync>;

/// Why the server could not start.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("failed to load TLS certificate: {0}")]
    Tls(#[source] io::Error),

    #[error("failed to load site content: {0}")]
    Content(#[source] io::Error),
}

impl StartError {
    pub fn code(&self) -> &'static str {
        match self {
            StartError::Config(e) => e.code(),
            StartError::Bind(e) => e.code(),
            StartError::Tls(_) => "ERR_TLS",
            StartError::Content(_) => "ERR_CONTENT",
        }
    }
}

/// A configured, not yet listening server.
pub struct Server {
    config: ServerConfig,
    generator: Arc<dyn SiteGenerator>,
    table: Arc<MemoryRouteTable>,
    notifier: RebuildNotifier,
    started: Vec<StartedHook>,
}

impl Server {
    /// Serve the files under `config.server.source_dir`.
    pub fn new(config: ServerConfig) -> Self {
        let generator: Arc<dyn SiteGenerator> =
            Arc::new(DirectoryGenerator::new(&config.server.source_dir));
        Self {
            config,
            generator,
            table: Arc::new(MemoryRouteTable::new()),
            notifier: RebuildNotifier::new(),
            started: Vec::new(),
        }
    }

    /// Replace the content source.
    pub fn with_generator(mut self, generator: Arc<dyn SiteGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Run `hook` with the served URL once the server is listening.
    pub fn on_started<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.started.push(Box::new(hook));
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn route_table(&self) -> &Arc<MemoryRouteTable> {
        &self.table
    }

    pub fn notifier(&self) -> &RebuildNotifier {
        &self.notifier
    }

    /// Build the request handling stack for the current configuration.
    ///
    /// The returned cache is already subscribed to rebuild notifications.
    pub fn build_router(&self) -> Result<(Router, Arc<ResponseCache>), StartError> {
        let server = &self.config.server;
        let cache_config = &self.config.cache;

        let cache = ResponseCache::new(cache_config.capacity, &cache_config.filter).map_err(|source| {
            ConfigError::InvalidCacheFilter {
                pattern: cache_config.filter.clone(),
                source,
            }
        })?;
        let cache = Arc::new(cache);
        cache.subscribe(&self.notifier);

        let table: Arc<dyn RouteTable> = self.table.clone();
        let resolver = Resolver::new(
            table,
            server.root.as_str(),
            ResolveOptions {
                trailing_html: server.trailing_html,
                trailing_index: server.trailing_index,
                redirect_permanent: server.redirect_permanent,
            },
        );

        let proxy = match (&self.config.proxy.path, &self.config.proxy.url) {
            (Some(path), Some(url)) => {
                let upstream = Url::parse(url).map_err(|e| ConfigError::InvalidProxy(e.to_string()))?;
                Some(ProxyStage::new(path.as_str(), upstream))
            }
            _ => None,
        };

        let pipeline = Pipeline::builder()
            .optional(
                server
                    .log
                    .as_deref()
                    .map(|format| Logger::new(LogFormat::parse_or_default(format))),
            )
            .stage(RouteStage::new(
                resolver,
                server.root.as_str(),
                cache.clone(),
                server.pre_compressed,
            ))
            .optional(
                server
                    .static_dir
                    .as_deref()
                    .map(|dir| StaticStage::new(server.root.as_str(), dir)),
            )
            .optional(RootRedirect::for_root(&server.root))
            .optional(proxy)
            .build();

        let mut app = Router::new()
            .fallback(move |request: Request| {
                let pipeline = pipeline.clone();
                async move { pipeline.dispatch(request).await }
            })
            .layer(TraceLayer::new_for_http());

        if server.compress {
            app = app.layer(CompressionLayer::new());
        }
        if server.header {
            app = app.layer(SetResponseHeaderLayer::overriding(
                HeaderName::from_static("x-powered-by"),
                HeaderValue::from_static(POWERED_BY),
            ));
        }

        Ok((app, cache))
    }

    /// Start listening.
    pub async fn start(self) -> Result<ListeningServer, StartError> {
        startup::enter(Phase::Idle);
        let server = &self.config.server;

        let bind = BindAddress::new(server.ip, server.port).map_err(|e| fail(e.into()))?;
        validate_config(&self.config).map_err(|e| fail(e.into()))?;

        startup::enter(Phase::PortChecking);
        check_port(&bind).await.map_err(|e| fail(e.into()))?;

        let tls = self.resolve_tls().await.map_err(fail)?;

        startup::enter(Phase::MiddlewareWiring);
        let (app, cache) = self.build_router().map_err(fail)?;

        let mode = if server.static_mode {
            ContentMode::Static
        } else {
            ContentMode::Watch
        };
        startup::enter(Phase::ContentLoading(mode));
        let routes = rebuild(self.generator.as_ref(), &self.table, &self.notifier)
            .await
            .map_err(|e| fail(StartError::Content(e)))?;
        tracing::info!(routes, "Site content loaded");

        let watcher = match mode {
            ContentMode::Static => None,
            ContentMode::Watch => match SiteWatcher::start(
                &server.source_dir,
                Duration::from_millis(server.watch_debounce_ms),
                self.generator.clone(),
                self.table.clone(),
                self.notifier.clone(),
            ) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(path = ?server.source_dir, error = %e, "Not watching for changes");
                    None
                }
            },
        };

        // The watcher is dropped, and so stopped, on every early return below.
        startup::enter(Phase::Listening);
        let listener = Listener::bind(&bind).await.map_err(|e| fail(e.into()))?;
        let local_addr = listener.local_addr();
        let std_listener = listener
            .into_std()
            .map_err(|e| fail(BindError::classify(e, bind.port()).into()))?;

        let https = tls.is_some();
        let handle = Handle::new();
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        let mut task = match tls {
            Some(config) => tokio::spawn(
                axum_server::tls_rustls::from_tcp_rustls(std_listener, config)
                    .handle(handle.clone())
                    .serve(service),
            ),
            None => tokio::spawn(
                axum_server::from_tcp(std_listener)
                    .handle(handle.clone())
                    .serve(service),
            ),
        };

        if handle.listening().await.is_none() {
            let err = match (&mut task).await {
                Ok(Err(e)) => e,
                Ok(Ok(())) => io::Error::other("server stopped before listening"),
                Err(e) => io::Error::other(e),
            };
            return Err(fail(BindError::classify(err, bind.port()).into()));
        }

        let ip = match server.ip {
            Some(ip) => ip.to_string(),
            None => local_addr.ip().to_string(),
        };
        let url = format_address(&ip, local_addr.port(), &server.root, https);

        startup::enter(Phase::Serving);
        tracing::info!("devhost is running at {url} . Press Ctrl+C to stop.");

        for hook in &self.started {
            hook(&url);
        }
        if server.open {
            let target = url.clone();
            tokio::spawn(async move {
                if let Err(e) = browser::open(&target).await {
                    tracing::warn!(url = %target, error = %e, "Failed to open browser");
                }
            });
        }

        Ok(ListeningServer {
            local_addr,
            url,
            https,
            handle,
            task: Some(task),
            watcher,
            table: self.table,
            notifier: self.notifier,
            cache,
            closed: false,
        })
    }

    /// HTTPS settings, or `None` to serve plain HTTP.
    async fn resolve_tls(&self) -> Result<Option<RustlsConfig>, StartError> {
        let tls = &self.config.tls;
        if !tls.is_enabled() {
            return Ok(None);
        }

        if let (Some(cert), Some(key)) = (&tls.cert, &tls.key) {
            let config = load_tls_config(cert, key).await.map_err(StartError::Tls)?;
            tracing::info!(cert = ?cert, "Using provided certificate");
            return Ok(Some(config));
        }
        if tls.cert.is_some() || tls.key.is_some() {
            tracing::warn!("Both a certificate and a key are required, provisioning one instead");
        }

        let provisioner = CertificateProvisioner::from_config(tls);
        let provisioned = match provisioner.ensure_certificate(&tls.hosts).await {
            Ok(bundle) => {
                tracing::info!(root_ca = ?bundle.root_ca, "Certificate ready");
                load_tls_config(&bundle.cert, &bundle.key)
                    .await
                    .map_err(CertificateError::from)
            }
            Err(e) => Err(e),
        };

        match provisioned {
            Ok(config) => Ok(Some(config)),
            Err(e) => {
                tracing::warn!(error = %e, "Certificate provisioning failed. Falling back to http");
                Ok(None)
            }
        }
    }
}

fn fail(err: StartError) -> StartError {
    startup::enter(Phase::Failed(err.code()));
    tracing::error!(code = err.code(), "{err}");
    err
}

/// A running server. Dropping it closes it.
pub struct ListeningServer {
    local_addr: SocketAddr,
    url: String,
    https: bool,
    handle: Handle,
    task: Option<JoinHandle<io::Result<()>>>,
    watcher: Option<SiteWatcher>,
    table: Arc<MemoryRouteTable>,
    notifier: RebuildNotifier,
    cache: Arc<ResponseCache>,
    closed: bool,
}

impl ListeningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL a person can open, e.g. `http://localhost:4000/`.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_https(&self) -> bool {
        self.https
    }

    pub fn route_table(&self) -> &Arc<MemoryRouteTable> {
        &self.table
    }

    pub fn notifier(&self) -> &RebuildNotifier {
        &self.notifier
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop accepting, drop open connections, and stop watching.
    ///
    /// Calling it again does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.handle.shutdown();
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        tracing::info!(address = %self.local_addr, "Server closed");
    }

    /// Serve until `signal` fires or the server stops on its own.
    pub async fn run_until(mut self, mut signal: ShutdownSignal) -> io::Result<()> {
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        tokio::select! {
            result = &mut task => {
                self.close();
                return result.map_err(io::Error::other)?;
            }
            _ = signal.recv() => {}
        }

        self.close();
        task.await.map_err(io::Error::other)?
    }
}

impl Drop for ListeningServer {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ListeningServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListeningServer")
            .field("local_addr", &self.local_addr)
            .field("url", &self.url)
            .field("https", &self.https)
            .field("closed", &self.closed)
            .finish()
    }
}
