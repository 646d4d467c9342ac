//! # Recache Core
//!
//! Keyed caching engine that sits between consumers and slow data sources.
//!
//! For every key the engine keeps a time-bounded history of values
//! ([`TimedHistoryStore`]), guarantees that concurrent callers share one
//! upstream fetch ([`RequestCoalescer`]), and binds both to an optional
//! durable tier ([`Persister`]) inside a [`CacheSlot`]. The
//! [`KeyedCacheRegistry`] owns the slots, creates them lazily and clears or
//! shuts them down per key or all at once.
//!
//! ## Architecture Principles
//! - Only depends on `recache-common`
//! - Disk, network and log sinks are reached through traits
//! - No background tasks: expiry is evaluated lazily, fetches run on the
//!   caller's executor
//!
//! ```rust
//! use std::time::Duration;
//!
//! use recache_core::{CacheConfig, KeyedCacheRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), recache_core::CacheError> {
//! let registry: KeyedCacheRegistry<String> =
//!     KeyedCacheRegistry::new(CacheConfig::ttl(Duration::from_secs(30)))?;
//!
//! let slot = registry.slot_for("user:42")?;
//! let first = slot
//!     .read(|| async { Ok::<_, std::io::Error>("Ada".to_string()) })
//!     .await?
//!     .into_vec();
//! assert_eq!(first, vec!["Ada".to_string()]);
//!
//! // Served from memory, the producer is not called again
//! assert_eq!(slot.get()?.into_vec(), vec!["Ada".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod coalescer;
pub mod config;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod logging;
pub mod persist;
pub mod registry;
pub mod slot;

pub use coalescer::{CoalescerStats, FetchHandle, RequestCoalescer};
pub use config::{CacheConfig, CacheConfigBuilder, ExpiryPolicy};
pub use error::{CacheError, CacheResult};
pub use history::{HistoryStats, Snapshot, TimedHistoryStore};
pub use lifecycle::{Clearable, MultiClearable, MultiShutdownable, Shutdownable};
pub use logging::{Logger, NoopLogger, RepoLogger, TracingLogger};
pub use persist::{InMemoryPersister, NoopPersister, Persister};
pub use registry::{KeyedCacheRegistry, RegistryBuilder};
pub use slot::CacheSlot;
