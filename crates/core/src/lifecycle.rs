//! Clear and shutdown capabilities shared by slots and registries.

use async_trait::async_trait;

use crate::error::CacheResult;

/// Something whose cached state can be dropped while staying usable.
#[async_trait]
pub trait Clearable: Send + Sync {
    async fn clear(&self) -> CacheResult<()>;
}

/// Something that can be torn down for good.
#[async_trait]
pub trait Shutdownable: Send + Sync {
    async fn shutdown(&self) -> CacheResult<()>;
}

/// Keyed variant of [`Clearable`].
#[async_trait]
pub trait MultiClearable: Clearable {
    /// Clear only the state held for `key`. Unknown keys are a no-op.
    async fn clear_key(&self, key: &str) -> CacheResult<()>;
}

/// Keyed variant of [`Shutdownable`].
#[async_trait]
pub trait MultiShutdownable: Shutdownable + MultiClearable {
    /// Shut down only what is held for `key`. Unknown keys are a no-op.
    async fn shutdown_key(&self, key: &str) -> CacheResult<()>;
}
