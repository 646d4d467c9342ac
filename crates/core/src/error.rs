//! Error type for the cache engine.

use std::sync::Arc;

use recache_common::error::{CommonError, ErrorSeverity};
use recache_common::impl_error_classification;
use thiserror::Error;

/// Result alias used throughout the cache engine.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by stores, slots and the registry.
///
/// `CacheError` is `Clone` because a single fetch outcome is delivered to
/// every caller that joined the same in-flight request.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Invalid configuration (for example a zero TTL).
    #[error(transparent)]
    Config(#[from] CommonError),

    /// The upstream producer failed. The original error is kept as the source.
    #[error("fetch for key '{key}' failed: {source}")]
    Fetch {
        key: String,
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The in-flight fetch was cancelled by a clear or shutdown of its slot.
    #[error("fetch for key '{key}' was cancelled")]
    Cancelled { key: String },

    /// The slot was shut down and can no longer be used.
    #[error("cache slot '{key}' has been shut down")]
    SlotShutdown { key: String },

    /// The registry was shut down and does not hand out slots.
    #[error("cache registry has been shut down")]
    RegistryShutdown,

    /// The durable tier failed during an explicit persistence operation.
    #[error("persistence failure for key '{key}': {source}")]
    Persistence {
        key: String,
        #[source]
        source: CommonError,
    },
}

impl CacheError {
    /// Wrap a producer error for `key`.
    pub fn fetch<E>(key: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Fetch { key: key.into(), source: Arc::new(error) }
    }

    pub fn cancelled(key: impl Into<String>) -> Self {
        Self::Cancelled { key: key.into() }
    }

    pub fn slot_shutdown(key: impl Into<String>) -> Self {
        Self::SlotShutdown { key: key.into() }
    }

    pub fn persistence(key: impl Into<String>, source: CommonError) -> Self {
        Self::Persistence { key: key.into(), source }
    }

    /// True when the error came from a cancelled fetch.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// True for both slot and registry shutdown.
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::SlotShutdown { .. } | Self::RegistryShutdown)
    }

    /// Key the error relates to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Fetch { key, .. }
            | Self::Cancelled { key }
            | Self::SlotShutdown { key }
            | Self::Persistence { key, .. } => Some(key),
            Self::Config(_) | Self::RegistryShutdown => None,
        }
    }
}

impl_error_classification!(CacheError, Config,
    Self::Fetch { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Cancelled { .. } => {
        retryable: true,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::SlotShutdown { .. } | Self::RegistryShutdown => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::Persistence { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
);
