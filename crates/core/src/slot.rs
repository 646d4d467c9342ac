//! Per-key cache slot
//!
//! A [`CacheSlot`] binds one key's [`TimedHistoryStore`], its
//! [`RequestCoalescer`] and the shared [`Persister`] behind a single
//! read/write surface:
//!
//! - `read` serves memory first, then (optionally) the persisted history,
//!   then a coalesced upstream fetch
//! - `add`/`add_all` push values that arrived out of band
//! - `clear` drops everything for the key but keeps the slot usable
//! - `shutdown` clears and retires the slot; later calls are rejected

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use recache_common::{Clock, SystemClock};
use tokio::sync::Mutex as AsyncMutex;

use crate::coalescer::{CoalescerStats, RequestCoalescer};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::history::{HistoryStats, Snapshot, TimedHistoryStore};
use crate::lifecycle::{Clearable, Shutdownable};
use crate::logging::Logger;
use crate::persist::Persister;

/// Cached history, single-flight fetch and persister binding for one key.
pub struct CacheSlot<T, C = SystemClock>
where
    T: Send + Sync + 'static,
    C: Clock,
{
    key: String,
    store: Arc<TimedHistoryStore<T, C>>,
    coalescer: RequestCoalescer<T>,
    persister: Arc<dyn Persister<T>>,
    read_through: bool,
    // Held across every change that touches both tiers. A clear takes it
    // too, so nothing lands between wiping memory and invalidating the
    // persisted history.
    tier: Arc<AsyncMutex<()>>,
    logger: Logger,
    shut_down: AtomicBool,
    retired: AtomicBool,
}

impl<T> CacheSlot<T, SystemClock>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a standalone slot logging through `tracing`.
    ///
    /// # Errors
    /// Returns [`CacheError::Config`] when `config` is invalid.
    pub fn new(
        key: impl Into<String>,
        config: &CacheConfig,
        persister: Arc<dyn Persister<T>>,
    ) -> CacheResult<Self> {
        let key = key.into();
        let logger = Logger::tracing(&config.log_tag, config.debug_logging).child(&key);
        Self::with_clock(key, config, persister, logger, SystemClock)
    }
}

impl<T, C> CacheSlot<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clock,
{
    /// Create a slot with an explicit logger and clock.
    ///
    /// # Errors
    /// Returns [`CacheError::Config`] when `config` is invalid.
    pub fn with_clock(
        key: impl Into<String>,
        config: &CacheConfig,
        persister: Arc<dyn Persister<T>>,
        logger: Logger,
        clock: C,
    ) -> CacheResult<Self> {
        config.validate()?;
        let key = key.into();
        let store = TimedHistoryStore::with_clock(config.ttl, config.expiry, clock)?;

        Ok(Self {
            coalescer: RequestCoalescer::with_logger(key.clone(), logger.clone()),
            key,
            store: Arc::new(store),
            persister,
            read_through: config.read_through_persister,
            tier: Arc::new(AsyncMutex::new(())),
            logger,
            shut_down: AtomicBool::new(false),
            retired: AtomicBool::new(false),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current unexpired history, without fetching.
    ///
    /// # Errors
    /// Returns [`CacheError::SlotShutdown`] after `shutdown`.
    pub fn get(&self) -> CacheResult<Snapshot<T>> {
        self.ensure_live()?;
        Ok(self.store.get())
    }

    /// Return the cached history, fetching through `producer` on a miss.
    ///
    /// A non-empty memory snapshot is returned as is. Otherwise the persisted
    /// history is consulted (when read-through is enabled) and, failing that,
    /// the fetch is coalesced with any other caller missing on this key. The
    /// fetched value is stored and persisted once per fetch, then returned as
    /// a single-value snapshot.
    ///
    /// # Errors
    /// - [`CacheError::Fetch`] when the producer fails
    /// - [`CacheError::Cancelled`] when the slot is cleared mid-fetch
    /// - [`CacheError::SlotShutdown`] after `shutdown`
    pub async fn read<F, Fut, E>(&self, producer: F) -> CacheResult<Snapshot<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.ensure_live()?;

        let cached = self.store.get();
        if !cached.is_empty() {
            self.logger.log("memory hit");
            return Ok(cached);
        }

        if self.read_through {
            if let Some(restored) = self.restore_persisted().await {
                return Ok(restored);
            }
        }

        self.logger.log("miss, fetching upstream");
        let value = self.fetch_through(producer).await?;
        Ok(Snapshot::from(vec![value]))
    }

    /// Fetch through `producer` regardless of what memory holds. The result
    /// is appended to the history. Concurrent refreshes and cold reads share
    /// one fetch.
    ///
    /// # Errors
    /// Same as [`read`](Self::read).
    pub async fn refresh<F, Fut, E>(&self, producer: F) -> CacheResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.ensure_live()?;
        self.logger.log("refreshing from upstream");
        self.fetch_through(producer).await
    }

    /// Append a value that arrived out of band and persist it.
    ///
    /// # Errors
    /// Returns [`CacheError::SlotShutdown`] after `shutdown`.
    pub async fn add(&self, value: T) -> CacheResult<()> {
        self.ensure_live()?;
        let _tier = self.tier.lock().await;
        self.store.add(value.clone());
        if let Err(err) = self.persister.write(&self.key, &value).await {
            self.logger.error(&err, "failed to persist value");
        }
        Ok(())
    }

    /// Append several values in order and persist them with one `write_all`.
    ///
    /// # Errors
    /// Returns [`CacheError::SlotShutdown`] after `shutdown`.
    pub async fn add_all(&self, values: Vec<T>) -> CacheResult<()> {
        self.ensure_live()?;
        if values.is_empty() {
            return Ok(());
        }
        let _tier = self.tier.lock().await;
        self.store.add_all(values.iter().cloned());
        if let Err(err) = self.persister.write_all(&self.key, &values).await {
            self.logger.error(&err, "failed to persist values");
        }
        Ok(())
    }

    /// Replace the whole history with `values`.
    ///
    /// # Errors
    /// Returns [`CacheError::SlotShutdown`] after `shutdown`.
    pub async fn replace(&self, values: Vec<T>) -> CacheResult<()> {
        self.clear().await?;
        self.add_all(values).await
    }

    /// Load the persisted history into memory. Returns the number of values
    /// loaded.
    ///
    /// Every value held in memory has already been written through, so a
    /// slot whose memory tier is non-empty loads nothing and returns `0`.
    /// The persister is still read, so a broken durable tier is reported.
    ///
    /// # Errors
    /// - [`CacheError::Persistence`] when the persister read fails
    /// - [`CacheError::SlotShutdown`] after `shutdown`
    pub async fn hydrate(&self) -> CacheResult<usize> {
        self.ensure_live()?;
        let _tier = self.tier.lock().await;

        let values = self
            .persister
            .read(&self.key)
            .await
            .map_err(|err| CacheError::persistence(self.key.clone(), err))?;

        if !self.store.is_empty() {
            self.logger.log("memory already populated, nothing to hydrate");
            return Ok(0);
        }

        let loaded = values.len();
        self.store.add_all(values);
        self.logger.log(format!("hydrated {loaded} values"));
        Ok(loaded)
    }

    /// Cancel any in-flight fetch, drop the memory history and invalidate
    /// the persisted one. The slot stays usable.
    ///
    /// # Errors
    /// Returns [`CacheError::SlotShutdown`] after `shutdown`.
    pub async fn clear(&self) -> CacheResult<()> {
        self.ensure_live()?;
        self.clear_state().await;
        Ok(())
    }

    /// Clear and retire the slot.
    ///
    /// # Errors
    /// Returns [`CacheError::SlotShutdown`] if the slot was already shut down.
    pub async fn shutdown(&self) -> CacheResult<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Err(CacheError::slot_shutdown(self.key.clone()));
        }
        self.clear_state().await;
        self.retired.store(true, Ordering::Release);
        self.logger.log("slot shut down");
        Ok(())
    }

    /// True from the moment `shutdown` is called.
    pub fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// True once `shutdown` has finished clearing both tiers.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// True while an upstream fetch for this key is running.
    pub fn is_fetching(&self) -> bool {
        self.coalescer.is_in_flight()
    }

    pub fn stats(&self) -> HistoryStats {
        self.store.stats()
    }

    pub fn coalescer_stats(&self) -> CoalescerStats {
        self.coalescer.stats()
    }

    fn ensure_live(&self) -> CacheResult<()> {
        if self.is_shutdown() {
            return Err(CacheError::slot_shutdown(self.key.clone()));
        }
        Ok(())
    }

    async fn clear_state(&self) {
        self.coalescer.cancel();
        let _tier = self.tier.lock().await;
        self.store.clear();
        if let Err(err) = self.persister.invalidate(&self.key).await {
            self.logger.error(&err, "failed to invalidate persisted history");
        }
        self.logger.log("cleared");
    }

    /// Seed memory from the persister on a cold read. Persister failures are
    /// logged and treated as an empty history.
    async fn restore_persisted(&self) -> Option<Snapshot<T>> {
        let _tier = self.tier.lock().await;

        // Another reader may have seeded memory while we waited
        let cached = self.store.get();
        if !cached.is_empty() {
            return Some(cached);
        }

        match self.persister.read(&self.key).await {
            Ok(values) if !values.is_empty() => {
                self.logger.log(format!("restored {} values from persister", values.len()));
                self.store.add_all(values.iter().cloned());
                Some(Snapshot::from(values))
            }
            Ok(_) => None,
            Err(err) => {
                self.logger.error(&err, "persister read failed, falling back to upstream");
                None
            }
        }
    }

    /// Route `producer` through the coalescer. The store append and the
    /// persister write happen inside the shared fetch, once per cycle, under
    /// the tier lock. The producer itself runs outside it, so a clear that
    /// completes meanwhile is detected through the store generation.
    async fn fetch_through<F, Fut, E>(&self, producer: F) -> CacheResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let store = Arc::clone(&self.store);
        let persister = Arc::clone(&self.persister);
        let tier = Arc::clone(&self.tier);
        let key = self.key.clone();
        let logger = self.logger.clone();

        self.coalescer
            .request(move || async move {
                let generation = store.generation();
                let value = producer().await?;

                let _tier = tier.lock().await;
                if store.add_if_generation(value.clone(), generation) {
                    if let Err(err) = persister.write(&key, &value).await {
                        logger.error(&err, "failed to persist fetched value");
                    }
                } else {
                    logger.log("slot cleared during fetch, value not cached");
                }
                Ok::<T, E>(value)
            })
            .await
    }
}

impl<T, C> std::fmt::Debug for CacheSlot<T, C>
where
    T: Send + Sync + 'static,
    C: Clock,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSlot")
            .field("key", &self.key)
            .field("read_through", &self.read_through)
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T, C> Clearable for CacheSlot<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clock,
{
    async fn clear(&self) -> CacheResult<()> {
        Self::clear(self).await
    }
}

#[async_trait]
impl<T, C> Shutdownable for CacheSlot<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clock,
{
    async fn shutdown(&self) -> CacheResult<()> {
        Self::shutdown(self).await
    }
}
