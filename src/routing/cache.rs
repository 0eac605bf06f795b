//! Byte-bounded LRU cache of streamed response bodies.
//!
//! # Responsibilities
//! - Replay hot bodies without touching the route table
//! - Fill on miss by teeing the content stream
//! - Drop everything when the site is rebuilt
//!
//! # Design Decisions
//! - Capacity is a byte budget; 0 disables caching entirely
//! - Concurrent fills of one key race; the last writer wins
//! - A fill that started before a reset is discarded, never inserted

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use lru::LruCache;
use regex::Regex;

use crate::site::{ContentStream, RebuildNotifier};

struct CacheState {
    entries: LruCache<String, Bytes>,
    used: u64,
}

/// LRU response cache keyed by normalized URL.
pub struct ResponseCache {
    capacity: u64,
    filter: Option<Regex>,
    state: Mutex<CacheState>,
    /// Bumped on every reset so in-flight fills can tell they are stale.
    generation: AtomicU64,
}

impl ResponseCache {
    /// Create a cache with a byte budget and an eligibility pattern.
    pub fn new(capacity: u64, filter: &str) -> Result<Self, regex::Error> {
        let filter = if capacity > 0 {
            Some(Regex::new(filter)?)
        } else {
            None
        };
        Ok(Self {
            capacity,
            filter,
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                used: 0,
            }),
            generation: AtomicU64::new(0),
        })
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            capacity: 0,
            filter: None,
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                used: 0,
            }),
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Whether responses for `key` may be cached.
    pub fn is_eligible(&self, key: &str) -> bool {
        self.filter.as_ref().is_some_and(|re| re.is_match(key))
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        if !self.is_enabled() {
            return None;
        }
        self.lock().entries.get(key).cloned()
    }

    /// Store `value`, evicting least-recently-used entries to fit.
    ///
    /// Values larger than the whole budget are not stored.
    pub fn insert(&self, key: String, value: Bytes) {
        if !self.fits(&value) {
            return;
        }
        let mut state = self.lock();
        self.store(&mut state, key, value);
    }

    fn insert_if_current(&self, key: String, value: Bytes, generation: u64) {
        if !self.fits(&value) {
            return;
        }
        // Checked under the lock so a concurrent reset cannot slip in between.
        let mut state = self.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(key = %key, "Discarding fill from before rebuild");
            return;
        }
        self.store(&mut state, key, value);
    }

    fn fits(&self, value: &Bytes) -> bool {
        self.is_enabled() && value.len() as u64 <= self.capacity
    }

    fn store(&self, state: &mut CacheState, key: String, value: Bytes) {
        let size = value.len() as u64;
        if let Some(old) = state.entries.pop(&key) {
            state.used -= old.len() as u64;
        }
        while state.used + size > self.capacity {
            match state.entries.pop_lru() {
                Some((evicted, old)) => {
                    state.used -= old.len() as u64;
                    tracing::trace!(key = %evicted, bytes = old.len(), "Cache eviction");
                }
                None => break,
            }
        }
        state.used += size;
        state.entries.put(key, value);
    }

    /// Drop every entry.
    pub fn reset(&self) {
        let mut state = self.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.entries.clear();
        state.used = 0;
        tracing::debug!("Response cache reset");
    }

    /// Reset this cache whenever the site is rebuilt.
    pub fn subscribe(self: &Arc<Self>, notifier: &RebuildNotifier) {
        let cache = Arc::clone(self);
        notifier.on_rebuild_complete(move || cache.reset());
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently held.
    pub fn size_bytes(&self) -> u64 {
        self.lock().used
    }

    /// Wrap `source` so the bytes it yields are cached under `key` once it
    /// completes without error.
    pub fn tee(self: &Arc<Self>, key: String, source: ContentStream) -> ContentStream {
        CacheFill {
            source,
            buffer: Vec::new(),
            key: Some(key),
            cache: Arc::clone(self),
            generation: self.generation.load(Ordering::SeqCst),
        }
        .boxed()
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("capacity", &self.capacity)
            .field("filter", &self.filter.as_ref().map(Regex::as_str))
            .field("entries", &self.len())
            .finish()
    }
}

/// Stream adapter that forwards chunks while accumulating them.
struct CacheFill {
    source: ContentStream,
    buffer: Vec<u8>,
    /// `None` once the fill is abandoned or done.
    key: Option<String>,
    cache: Arc<ResponseCache>,
    generation: u64,
}

impl Stream for CacheFill {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.source.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if this.key.is_some() {
                    if (this.buffer.len() + chunk.len()) as u64 > this.cache.capacity {
                        this.key = None;
                        this.buffer = Vec::new();
                    } else {
                        this.buffer.extend_from_slice(&chunk);
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.key = None;
                this.buffer = Vec::new();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if let Some(key) = this.key.take() {
                    let body = Bytes::from(std::mem::take(&mut this.buffer));
                    this.cache.insert_if_current(key, body, this.generation);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
