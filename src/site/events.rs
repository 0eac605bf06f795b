//! Rebuild-complete notification.

use std::sync::{Arc, RwLock};

type Callback = Box<dyn Fn() + Send + Sync>;

/// Observer for the "generation complete" signal.
///
/// Subscribers register once at wiring time; `notify` runs them in
/// registration order on the caller's task.
#[derive(Clone, Default)]
pub struct RebuildNotifier {
    callbacks: Arc<RwLock<Vec<Callback>>>,
}

impl RebuildNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback fired after every completed rebuild.
    pub fn on_rebuild_complete<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        callbacks.push(Box::new(callback));
    }

    /// Signal that a rebuild finished and the route table was replaced.
    pub fn notify(&self) {
        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tracing::debug!(subscribers = callbacks.len(), "Rebuild complete");
        for callback in callbacks.iter() {
            callback();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl std::fmt::Debug for RebuildNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notifies_every_subscriber() {
        let notifier = RebuildNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let hits = hits.clone();
            notifier.on_rebuild_complete(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        notifier.notify();
        notifier.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert_eq!(notifier.subscriber_count(), 2);
    }

    #[test]
    fn clones_share_subscribers() {
        let notifier = RebuildNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        notifier.clone().on_rebuild_complete(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
