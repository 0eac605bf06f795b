//! In-memory route table.
//!
//! # Responsibilities
//! - Map normalized paths to lazily-opened content
//! - Normalize request URLs into stored path form
//! - Swap the whole table atomically on rebuild
//!
//! # Design Decisions
//! - Readers load an `Arc` snapshot; a rebuild never mutates in place
//! - Content is opened per request as a byte stream, never cached here

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};

/// A stream of body chunks for one route entry.
pub type ContentStream = BoxStream<'static, io::Result<Bytes>>;

/// Full contents of a generated site, keyed by normalized path.
pub type RouteMap = HashMap<String, Arc<dyn ContentSource>>;

/// Something that can be opened as a fresh content stream.
pub trait ContentSource: Send + Sync + std::fmt::Debug {
    fn open(&self) -> ContentStream;
}

impl ContentSource for Bytes {
    fn open(&self) -> ContentStream {
        let data = self.clone();
        stream::once(async move { Ok(data) }).boxed()
    }
}

/// Content read from disk when the route is requested.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContentSource for FileSource {
    fn open(&self) -> ContentStream {
        let path = self.path.clone();
        stream::once(async move { tokio::fs::read(path).await.map(Bytes::from) }).boxed()
    }
}

/// Lookup interface the serving pipeline reads from.
pub trait RouteTable: Send + Sync {
    /// Open the content stored at `path`, if any.
    fn get(&self, path: &str) -> Option<ContentStream>;

    /// Whether `path` is stored.
    fn contains(&self, path: &str) -> bool;

    /// Normalize a decoded request URL into stored path form.
    fn format(&self, url: &str) -> String {
        format_path(url)
    }
}

/// Normalize a decoded URL: strip leading slashes and the query, convert
/// backslashes, and append `index.html` to directory-style paths.
pub fn format_path(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or_default();
    let mut path = without_query.trim_start_matches('/').replace('\\', "/");
    if path.is_empty() || path.ends_with('/') {
        path.push_str("index.html");
    }
    path
}

/// Route table backed by an atomically swapped map.
#[derive(Default)]
pub struct MemoryRouteTable {
    routes: ArcSwap<RouteMap>,
}

impl MemoryRouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(routes: RouteMap) -> Self {
        Self {
            routes: ArcSwap::from_pointee(routes),
        }
    }

    /// Replace every route at once.
    pub fn replace(&self, routes: RouteMap) {
        tracing::debug!(routes = routes.len(), "Route table replaced");
        self.routes.store(Arc::new(routes));
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MemoryRouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRouteTable")
            .field("routes", &self.len())
            .finish()
    }
}

impl RouteTable for MemoryRouteTable {
    fn get(&self, path: &str) -> Option<ContentStream> {
        self.routes.load().get(path).map(|source| source.open())
    }

    fn contains(&self, path: &str) -> bool {
        self.routes.load().contains_key(path)
    }
}

/// Build a route map from in-memory strings.
pub fn route_map<I, K, V>(entries: I) -> RouteMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Bytes>,
{
    entries
        .into_iter()
        .map(|(path, data)| {
            let source: Arc<dyn ContentSource> = Arc::new(data.into());
            (path.into(), source)
        })
        .collect()
}

/// Drain a content stream into one buffer.
pub async fn collect(mut stream: ContentStream) -> io::Result<Bytes> {
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(Bytes::from(buf))
}
