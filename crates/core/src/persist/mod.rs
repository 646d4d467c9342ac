//! Port interfaces for the durable tier
//!
//! A [`Persister`] stores the history of each key outside the process so it
//! survives restarts. Slots call it after successful fetches and explicit
//! additions, and on a memory miss when read-through is enabled.

mod memory;
mod noop;

use async_trait::async_trait;
use recache_common::CommonResult;

pub use memory::InMemoryPersister;
pub use noop::NoopPersister;

/// Durable storage for per-key histories
#[async_trait]
pub trait Persister<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Read everything stored for `key`, oldest first. Unknown keys yield an
    /// empty history.
    async fn read(&self, key: &str) -> CommonResult<Vec<T>>;

    /// Append a single value to the history of `key`
    async fn write(&self, key: &str, value: &T) -> CommonResult<()>;

    /// Append several values to the history of `key`, in order
    async fn write_all(&self, key: &str, values: &[T]) -> CommonResult<()>;

    /// Drop the stored history of `key`
    async fn invalidate(&self, key: &str) -> CommonResult<()>;

    /// Drop every stored history
    async fn clear_all(&self) -> CommonResult<()>;
}
