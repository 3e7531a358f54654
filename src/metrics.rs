use std::sync::atomic::{AtomicU64, Ordering};

/// Counters from resolution attempts.  Shared between all clones of a
/// resolver, updated with relaxed atomics - these are diagnostics, not
/// synchronisation.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Questions answered straight from the cache.
    cache_hits: AtomicU64,
    /// Questions which had to go to the network.
    cache_misses: AtomicU64,
    /// Questions some upstream nameserver answered.
    nameserver_hits: AtomicU64,
    /// Questions every queried nameserver failed to answer.
    nameserver_misses: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn nameserver_hit(&self) {
        self.nameserver_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn nameserver_miss(&self) {
        self.nameserver_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            nameserver_hits: self.nameserver_hits.load(Ordering::Relaxed),
            nameserver_misses: self.nameserver_misses.load(Ordering::Relaxed),
        }
    }
}

/// The counter values at one moment.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub nameserver_hits: u64,
    pub nameserver_misses: u64,
}
