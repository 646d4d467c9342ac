//! Time-bounded history store
//!
//! [`TimedHistoryStore`] keeps an append-only, insertion-ordered list of
//! values and hides every value older than the configured TTL. Expiry is
//! lazy: reads filter stale entries, writes sweep them from the front.
//!
//! ```
//! use std::time::Duration;
//!
//! use recache_core::TimedHistoryStore;
//!
//! let store = TimedHistoryStore::new(Duration::from_secs(30)).unwrap();
//! store.add("first");
//! let before = store.get();
//! store.add("second");
//!
//! // Snapshots are isolated from later writes
//! assert_eq!(before.into_vec(), vec!["first"]);
//! assert_eq!(store.get().into_vec(), vec!["first", "second"]);
//! ```

mod snapshot;
mod stats;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use recache_common::{Clock, CommonError, SystemClock};

pub use snapshot::Snapshot;
pub use stats::HistoryStats;
use stats::MetricsCollector;

use crate::config::ExpiryPolicy;
use crate::error::CacheResult;

#[derive(Debug)]
struct Entry<T> {
    value: T,
    inserted_at: Instant,
}

#[derive(Debug)]
struct HistoryState<T> {
    entries: VecDeque<Entry<T>>,
    last_write: Option<Instant>,
    generation: u64,
}

/// Append-only history whose entries expire after a fixed TTL.
///
/// Thread-safe: reads share a lock, writes and clears take it exclusively.
/// No background timer is involved.
#[derive(Debug)]
pub struct TimedHistoryStore<T, C = SystemClock>
where
    C: Clock,
{
    ttl: Duration,
    expiry: ExpiryPolicy,
    state: RwLock<HistoryState<T>>,
    clock: C,
    metrics: MetricsCollector,
}

impl<T: Clone> TimedHistoryStore<T, SystemClock> {
    /// Create a per-entry store with the given retention window.
    ///
    /// # Errors
    /// Returns a configuration error when `ttl` is zero.
    pub fn new(ttl: Duration) -> CacheResult<Self> {
        Self::with_clock(ttl, ExpiryPolicy::PerEntry, SystemClock)
    }

    /// Create a store with an explicit expiry policy.
    ///
    /// # Errors
    /// Returns a configuration error when `ttl` is zero.
    pub fn with_policy(ttl: Duration, expiry: ExpiryPolicy) -> CacheResult<Self> {
        Self::with_clock(ttl, expiry, SystemClock)
    }
}

impl<T: Clone, C: Clock> TimedHistoryStore<T, C> {
    /// Create a store with a custom clock (useful for testing)
    ///
    /// # Errors
    /// Returns a configuration error when `ttl` is zero.
    pub fn with_clock(ttl: Duration, expiry: ExpiryPolicy, clock: C) -> CacheResult<Self> {
        if ttl.is_zero() {
            return Err(CommonError::config_field("ttl", "must be greater than zero").into());
        }

        Ok(Self {
            ttl,
            expiry,
            state: RwLock::new(HistoryState { entries: VecDeque::new(), last_write: None, generation: 0 }),
            clock,
            metrics: MetricsCollector::default(),
        })
    }

    /// Retention window
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// How entry ages are measured against [`ttl`](Self::ttl)
    pub const fn expiry(&self) -> ExpiryPolicy {
        self.expiry
    }

    /// Append a value stamped with the current time.
    pub fn add(&self, value: T) {
        self.add_all(std::iter::once(value));
    }

    /// Append several values in order under one write lock. They share a
    /// single timestamp.
    pub fn add_all<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut state = self.state.write();
        self.append(&mut state, values);
    }

    /// Current clear generation. Every `clear` increments it.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Append `value` only if the store has not been cleared since
    /// `generation` was observed. Returns whether the value was stored.
    pub fn add_if_generation(&self, value: T, generation: u64) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            return false;
        }
        self.append(&mut state, std::iter::once(value));
        true
    }

    fn append<I>(&self, state: &mut HistoryState<T>, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let now = self.clock.now();
        let swept = self.sweep(state, now);
        self.metrics.record_expirations(swept);

        let before = state.entries.len();
        state.entries.extend(values.into_iter().map(|value| Entry { value, inserted_at: now }));
        let added = state.entries.len() - before;

        if added > 0 {
            state.last_write = Some(now);
            self.metrics.record_inserts(added);
        }
    }

    /// Snapshot of the unexpired values, oldest first.
    pub fn get(&self) -> Snapshot<T> {
        let now = self.clock.now();
        let state = self.state.read();

        let values: Vec<T> = state
            .entries
            .iter()
            .filter(|entry| !self.is_expired(&state, entry, now))
            .map(|entry| entry.value.clone())
            .collect();

        self.metrics.record_read(!values.is_empty());
        Snapshot::from(values)
    }

    /// Remove every entry. Clearing an empty store is a no-op.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.last_write = None;
        state.generation = state.generation.wrapping_add(1);
        self.metrics.record_clear();
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        let state = self.state.read();
        state.entries.iter().filter(|entry| !self.is_expired(&state, entry, now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> HistoryStats {
        self.metrics.snapshot(self.len())
    }

    /// Drop expired entries from the front. Entries are stored in insertion
    /// order, so the expired ones always form a prefix.
    fn sweep(&self, state: &mut HistoryState<T>, now: Instant) -> usize {
        let mut swept = 0;
        while let Some(front) = state.entries.front() {
            if !self.is_expired(state, front, now) {
                break;
            }
            state.entries.pop_front();
            swept += 1;
        }
        if state.entries.is_empty() {
            state.last_write = None;
        }
        swept
    }

    /// An entry is visible while its age is at most `ttl`.
    fn is_expired(&self, state: &HistoryState<T>, entry: &Entry<T>, now: Instant) -> bool {
        let stamp = match self.expiry {
            ExpiryPolicy::PerEntry => entry.inserted_at,
            ExpiryPolicy::ExtendOnWrite => state.last_write.unwrap_or(entry.inserted_at),
        };
        now.saturating_duration_since(stamp) > self.ttl
    }
}
