//! Per-site analysis cache.
//!
//! Explicit component owned by the caller: bounded capacity with LRU
//! eviction, TTL expiry, and an injected clock so tests control time.
//! No module-level singletons.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::contract::AnalysisResult;

/// Time source seam.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock implementation used in production.
#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry {
    result: AnalysisResult,
    stored_at: Instant,
    last_used: Instant,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
}

/// TTL + LRU cache keyed by site (host) name.
pub struct AnalysisCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl AnalysisCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self::with_clock(ttl, capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
            }),
            ttl,
            capacity: capacity.max(1),
            clock,
        }
    }

    pub fn get(&self, site: &str) -> Option<AnalysisResult> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(site) {
            Some(entry) if now.duration_since(entry.stored_at) <= self.ttl => {
                entry.last_used = now;
                debug!(site, "analysis cache hit");
                Some(entry.result.clone())
            }
            Some(_) => {
                inner.entries.remove(site);
                debug!(site, "analysis cache entry expired");
                None
            }
            None => None,
        }
    }

    pub fn put(&self, site: impl Into<String>, result: AnalysisResult) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.entries.len() >= self.capacity {
            // Evict expired entries first, then the least recently used.
            let ttl = self.ttl;
            inner
                .entries
                .retain(|_, entry| now.duration_since(entry.stored_at) <= ttl);
            while inner.entries.len() >= self.capacity {
                let oldest = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        debug!(site = %key, "analysis cache LRU eviction");
                        inner.entries.remove(&key);
                    }
                    None => break,
                }
            }
        }

        inner.entries.insert(
            site.into(),
            CacheEntry {
                result,
                stored_at: now,
                last_used: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}
