//! History statistics and metrics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time statistics for a [`TimedHistoryStore`](super::TimedHistoryStore)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Number of live (unexpired) entries
    pub size: usize,

    /// Reads that returned a non-empty snapshot
    pub hits: u64,

    /// Reads that returned an empty snapshot
    pub misses: u64,

    /// Values appended
    pub inserts: u64,

    /// Entries swept because their age exceeded the TTL
    pub expirations: u64,

    /// Calls to `clear`
    pub clears: u64,
}

impl HistoryStats {
    /// Calculate hit rate (hits / total reads)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_reads();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub const fn total_reads(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Lock-free counters behind [`HistoryStats`]
#[derive(Debug, Default)]
pub(crate) struct MetricsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    expirations: AtomicU64,
    clears: AtomicU64,
}

impl MetricsCollector {
    pub(crate) fn record_read(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_inserts(&self, count: usize) {
        self.inserts.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: usize) {
        if count > 0 {
            self.expirations.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, size: usize) -> HistoryStats {
        HistoryStats {
            size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
        }
    }
}
