//! Source directory watcher for rebuild-on-change.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::site::events::RebuildNotifier;
use crate::site::generator::{rebuild, SiteGenerator};
use crate::site::table::MemoryRouteTable;

/// Paths to ignore when watching for changes.
const IGNORED_PATHS: &[&str] = &[".git", "node_modules", "target", ".DS_Store"];

/// A running watch: the OS watcher plus the task that rebuilds on change.
///
/// Dropping it (or calling [`SiteWatcher::stop`]) stops both.
pub struct SiteWatcher {
    path: PathBuf,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl SiteWatcher {
    /// Start watching `path`; each debounced burst of changes triggers a rebuild.
    pub fn start(
        path: &Path,
        debounce: Duration,
        generator: Arc<dyn SiteGenerator>,
        table: Arc<MemoryRouteTable>,
        notifier: RebuildNotifier,
    ) -> Result<Self, notify::Error> {
        let (change_tx, change_rx) = mpsc::unbounded_channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_relevant(&event) {
                        let _ = change_tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )?;
        watcher.watch(path, RecursiveMode::Recursive)?;

        let task = tokio::spawn(rebuild_loop(change_rx, debounce, generator, table, notifier));

        tracing::info!(path = ?path, "Watching for changes");
        Ok(Self {
            path: path.to_path_buf(),
            watcher: Some(watcher),
            task: Some(task),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop watching. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            let _ = watcher.unwatch(&self.path);
            tracing::debug!(path = ?self.path, "Watcher stopped");
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SiteWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_relevant(event: &Event) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
        return false;
    }
    event.paths.iter().any(|path| {
        let path_str = path.to_string_lossy();
        !IGNORED_PATHS.iter().any(|ignored| path_str.contains(ignored))
    })
}

async fn rebuild_loop(
    mut change_rx: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
    generator: Arc<dyn SiteGenerator>,
    table: Arc<MemoryRouteTable>,
    notifier: RebuildNotifier,
) {
    while change_rx.recv().await.is_some() {
        // Let the burst settle, then fold queued signals into one rebuild.
        tokio::time::sleep(debounce).await;
        while change_rx.try_recv().is_ok() {}

        tracing::info!("Change detected, rebuilding...");
        match rebuild(generator.as_ref(), &table, &notifier).await {
            Ok(routes) => tracing::info!(routes, "Rebuild complete"),
            Err(e) => tracing::error!("Rebuild failed: {}. Keeping current routes.", e),
        }
    }
}
