//! Keyed registry of cache slots
//!
//! [`KeyedCacheRegistry`] owns one [`CacheSlot`] per key. Slots are created
//! lazily on first access with the registry's configuration, persister and
//! logger, and exactly one slot exists per key even under racing callers.
//! Clear and shutdown fan out per key or across every live slot.
//!
//! The registry is an ordinary value: hosts create it, share it (usually
//! behind an `Arc`) and decide when it is shut down. Independent registries
//! do not see each other's slots.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use recache_common::{Clock, SystemClock};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::lifecycle::{Clearable, MultiClearable, MultiShutdownable, Shutdownable};
use crate::logging::{Logger, RepoLogger, TracingLogger};
use crate::persist::{NoopPersister, Persister};
use crate::slot::CacheSlot;

/// Concurrent map from key to [`CacheSlot`].
pub struct KeyedCacheRegistry<T, C = SystemClock>
where
    T: Send + Sync + 'static,
    C: Clock + Clone,
{
    slots: DashMap<String, Arc<CacheSlot<T, C>>>,
    config: CacheConfig,
    persister: Arc<dyn Persister<T>>,
    logger: Logger,
    clock: C,
    // Held for reading while a slot is handed out, for writing while the
    // registry flips into or out of its terminal state
    closed: RwLock<bool>,
}

impl<T> KeyedCacheRegistry<T, SystemClock>
where
    T: Clone + Send + Sync + 'static,
{
    /// Registry without a durable tier, logging through `tracing`.
    ///
    /// # Errors
    /// Returns [`CacheError::Config`] when `config` is invalid.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: CacheConfig) -> RegistryBuilder<T> {
        RegistryBuilder::new(config)
    }
}

impl<T, C> KeyedCacheRegistry<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clock + Clone,
{
    /// Return the slot for `key`, creating it on first access.
    ///
    /// A slot that was shut down directly is replaced by a fresh one once
    /// its shutdown has finished.
    ///
    /// # Errors
    /// - [`CacheError::RegistryShutdown`] once the registry is shut down
    /// - [`CacheError::SlotShutdown`] while the slot for `key` is still being
    ///   shut down; retrying after `shutdown_key` returns yields a new slot
    pub fn slot_for(&self, key: &str) -> CacheResult<Arc<CacheSlot<T, C>>> {
        let closed = self.closed.read();
        if *closed {
            return Err(CacheError::RegistryShutdown);
        }

        if let Some(slot) = self.slots.get(key) {
            if !slot.is_shutdown() {
                return Ok(Arc::clone(slot.value()));
            }
        }

        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut existing) => {
                let current = existing.get();
                if !current.is_shutdown() {
                    return Ok(Arc::clone(current));
                }
                // Until its clear finishes, the old slot still owns the
                // persisted history of the key
                if !current.is_retired() {
                    return Err(CacheError::slot_shutdown(key));
                }
                let slot = self.new_slot(key)?;
                existing.insert(Arc::clone(&slot));
                self.logger.log(format!("replaced retired slot '{key}'"));
                Ok(slot)
            }
            Entry::Vacant(vacant) => {
                let slot = self.new_slot(key)?;
                vacant.insert(Arc::clone(&slot));
                self.logger.log(format!("created slot '{key}'"));
                Ok(slot)
            }
        }
    }

    /// Existing slot for `key`, without creating one.
    pub fn get(&self, key: &str) -> Option<Arc<CacheSlot<T, C>>> {
        self.slots.get(key).map(|slot| Arc::clone(slot.value()))
    }

    /// Clear the slot for `key`. Unknown keys are a no-op.
    pub async fn clear_key(&self, key: &str) {
        let slot = self.get(key);
        if let Some(slot) = slot {
            if let Err(err) = slot.clear().await {
                // Lost a race with shutdown_key
                self.logger.log(format!("skipped clear of '{key}': {err}"));
            }
        }
    }

    /// Clear every live slot, then drop the whole durable tier so histories
    /// of keys without a live slot go too.
    pub async fn clear(&self) {
        for slot in self.live_slots() {
            if let Err(err) = slot.clear().await {
                self.logger.log(format!("skipped clear of '{}': {err}", slot.key()));
            }
        }
        if let Err(err) = self.persister.clear_all().await {
            self.logger.error(&err, "failed to clear persisted histories");
        }
    }

    /// Shut down and remove the slot for `key`. Unknown keys are a no-op.
    ///
    /// The slot stays mapped until its shutdown has finished, so a
    /// concurrent `slot_for` cannot start a new slot whose persisted writes
    /// the old slot's invalidation would then delete.
    pub async fn shutdown_key(&self, key: &str) {
        let Some(slot) = self.get(key) else {
            return;
        };
        if let Err(err) = slot.shutdown().await {
            self.logger.log(format!("slot '{key}' was already shut down: {err}"));
        }
        self.slots.remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
    }

    /// Shut down every slot and stop handing out new ones. Calling it on a
    /// registry that is already shut down is a no-op.
    pub async fn shutdown(&self) {
        {
            let mut closed = self.closed.write();
            if *closed {
                return;
            }
            *closed = true;
        }

        let keys = self.keys();
        for key in &keys {
            self.shutdown_key(key).await;
        }
        self.logger.log(format!("registry shut down, released {} slots", keys.len()));
    }

    /// Leave the terminal state entered by [`shutdown`](Self::shutdown).
    /// Returns `false` if the registry was not shut down.
    pub fn reopen(&self) -> bool {
        let mut closed = self.closed.write();
        std::mem::replace(&mut *closed, false)
    }

    pub fn is_shutdown(&self) -> bool {
        *self.closed.read()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.slots.iter().map(|entry| entry.key().clone()).collect()
    }

    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn new_slot(&self, key: &str) -> CacheResult<Arc<CacheSlot<T, C>>> {
        let slot = CacheSlot::with_clock(
            key,
            &self.config,
            Arc::clone(&self.persister),
            self.logger.child(key),
            self.clock.clone(),
        )?;
        Ok(Arc::new(slot))
    }

    fn live_slots(&self) -> Vec<Arc<CacheSlot<T, C>>> {
        self.slots.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}

impl<T, C> std::fmt::Debug for KeyedCacheRegistry<T, C>
where
    T: Send + Sync + 'static,
    C: Clock + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedCacheRegistry")
            .field("slots", &self.slots.len())
            .field("config", &self.config)
            .field("closed", &*self.closed.read())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T, C> Clearable for KeyedCacheRegistry<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clock + Clone,
{
    async fn clear(&self) -> CacheResult<()> {
        Self::clear(self).await;
        Ok(())
    }
}

#[async_trait]
impl<T, C> MultiClearable for KeyedCacheRegistry<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clock + Clone,
{
    async fn clear_key(&self, key: &str) -> CacheResult<()> {
        Self::clear_key(self, key).await;
        Ok(())
    }
}

#[async_trait]
impl<T, C> Shutdownable for KeyedCacheRegistry<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clock + Clone,
{
    async fn shutdown(&self) -> CacheResult<()> {
        Self::shutdown(self).await;
        Ok(())
    }
}

#[async_trait]
impl<T, C> MultiShutdownable for KeyedCacheRegistry<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clock + Clone,
{
    async fn shutdown_key(&self, key: &str) -> CacheResult<()> {
        Self::shutdown_key(self, key).await;
        Ok(())
    }
}

/// Builder wiring a registry to its persister and log sink
pub struct RegistryBuilder<T>
where
    T: Send + Sync + 'static,
{
    config: CacheConfig,
    persister: Option<Arc<dyn Persister<T>>>,
    sink: Option<Arc<dyn RepoLogger>>,
}

impl<T> RegistryBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self { config, persister: None, sink: None }
    }

    /// Durable tier shared by every slot (defaults to [`NoopPersister`])
    pub fn persister(mut self, persister: Arc<dyn Persister<T>>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Log sink shared by every slot (defaults to [`TracingLogger`])
    pub fn logger(mut self, sink: Arc<dyn RepoLogger>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// # Errors
    /// Returns [`CacheError::Config`] when the configuration is invalid.
    pub fn build(self) -> CacheResult<KeyedCacheRegistry<T>> {
        self.build_with_clock(SystemClock)
    }

    /// Build a registry whose slots read time from `clock` (useful for testing)
    ///
    /// # Errors
    /// Returns [`CacheError::Config`] when the configuration is invalid.
    pub fn build_with_clock<C: Clock + Clone>(self, clock: C) -> CacheResult<KeyedCacheRegistry<T, C>> {
        self.config.validate()?;

        let sink: Arc<dyn RepoLogger> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(TracingLogger),
        };
        let logger = Logger::new(sink, &self.config.log_tag, self.config.debug_logging);
        let persister: Arc<dyn Persister<T>> = match self.persister {
            Some(persister) => persister,
            None => Arc::new(NoopPersister::new()),
        };

        Ok(KeyedCacheRegistry {
            slots: DashMap::new(),
            config: self.config,
            persister,
            logger,
            clock,
            closed: RwLock::new(false),
        })
    }
}
