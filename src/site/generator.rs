//! Site generation collaborators.
//!
//! The serving pipeline only needs "produce a full route map"; the default
//! generator maps an output directory onto the route table.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::fs;

use crate::site::events::RebuildNotifier;
use crate::site::table::{ContentSource, FileSource, MemoryRouteTable, RouteMap};

/// Produces the complete set of routes for one build.
pub trait SiteGenerator: Send + Sync {
    fn generate(&self) -> BoxFuture<'_, std::io::Result<RouteMap>>;
}

/// Serves every file under a directory, keyed by its `/`-separated relative path.
#[derive(Debug, Clone)]
pub struct DirectoryGenerator {
    root: PathBuf,
}

impl DirectoryGenerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SiteGenerator for DirectoryGenerator {
    fn generate(&self) -> BoxFuture<'_, std::io::Result<RouteMap>> {
        Box::pin(collect_routes(&self.root))
    }
}

async fn collect_routes(root: &Path) -> std::io::Result<RouteMap> {
    let mut routes = RouteMap::new();
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(current) = stack.pop() {
        let mut entries = fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = fs::metadata(&path).await?;

            if metadata.is_dir() {
                stack.push(path);
            } else if metadata.is_file() {
                let relative = path.strip_prefix(root).map_err(std::io::Error::other)?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let source: Arc<dyn ContentSource> = Arc::new(FileSource::new(path));
                routes.insert(key, source);
            }
        }
    }

    Ok(routes)
}

/// Run one generation: build, swap the table, then notify subscribers.
///
/// On failure the previous table stays in place and nobody is notified.
pub async fn rebuild(
    generator: &dyn SiteGenerator,
    table: &MemoryRouteTable,
    notifier: &RebuildNotifier,
) -> std::io::Result<usize> {
    let routes = generator.generate().await?;
    let count = routes.len();
    table.replace(routes);
    notifier.notify();
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::table::{collect, RouteTable};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn maps_nested_files_to_routes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("foo/bar")).unwrap();
        std::fs::write(dir.path().join("index.html"), "home").unwrap();
        std::fs::write(dir.path().join("foo/bar/baz.css"), "body{}").unwrap();

        let routes = DirectoryGenerator::new(dir.path()).generate().await.unwrap();
        assert_eq!(routes.len(), 2);
        assert!(routes.contains_key("index.html"));
        assert!(routes.contains_key("foo/bar/baz.css"));
    }

    #[tokio::test]
    async fn rebuild_swaps_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();

        let table = MemoryRouteTable::new();
        let notifier = RebuildNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        notifier.on_rebuild_complete(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        let generator = DirectoryGenerator::new(dir.path());
        let count = rebuild(&generator, &table, &notifier).await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(collect(table.get("a.txt").unwrap()).await.unwrap(), "a");
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_table() {
        let table = MemoryRouteTable::from_map(crate::site::table::route_map([("a.txt", "a")]));
        let notifier = RebuildNotifier::new();
        let generator = DirectoryGenerator::new("/definitely/not/a/site");

        assert!(rebuild(&generator, &table, &notifier).await.is_err());
        assert!(table.contains("a.txt"));
    }
}
