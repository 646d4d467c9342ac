//! Cache configuration types and builder patterns
//!
//! A [`CacheConfig`] is shared by every slot a registry creates. It carries
//! the retention window, the expiry policy and the logging switches.

use std::time::Duration;

use recache_common::CommonError;

use crate::error::CacheResult;

/// Retention window used by [`CacheConfig::default`].
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Tag prefixed to every debug line emitted by the engine.
pub const DEFAULT_LOG_TAG: &str = "recache";

/// How entry ages are measured against the TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Each entry expires `ttl` after its own insertion.
    #[default]
    PerEntry,
    /// Every write restarts the window for the whole history, which then
    /// expires together `ttl` after the most recent insertion.
    ExtendOnWrite,
}

impl ExpiryPolicy {
    /// Parse the names accepted in configuration files and env vars.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_entry" | "entry" => Some(Self::PerEntry),
            "extend_on_write" | "sliding" => Some(Self::ExtendOnWrite),
            _ => None,
        }
    }
}

/// Configuration for cache behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Retention window, must be greater than zero
    pub ttl: Duration,

    /// How entry ages are measured
    pub expiry: ExpiryPolicy,

    /// Consult the persister on a memory miss before calling the producer
    pub read_through_persister: bool,

    /// Emit per-operation debug lines through the repo logger
    pub debug_logging: bool,

    /// Tag attached to log lines
    pub log_tag: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            expiry: ExpiryPolicy::PerEntry,
            read_through_persister: true,
            debug_logging: false,
            log_tag: DEFAULT_LOG_TAG.to_string(),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Quick preset for a TTL-only cache
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    ///
    /// use recache_core::CacheConfig;
    ///
    /// let config = CacheConfig::ttl(Duration::from_secs(3600));
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn ttl(duration: Duration) -> Self {
        Self { ttl: duration, ..Self::default() }
    }

    /// Reject configurations the engine cannot honor.
    ///
    /// # Errors
    /// Returns [`CacheError::Config`](crate::CacheError::Config) for a zero
    /// TTL or an empty log tag.
    pub fn validate(&self) -> CacheResult<()> {
        if self.ttl.is_zero() {
            return Err(CommonError::config_field("ttl", "must be greater than zero").into());
        }
        if self.log_tag.trim().is_empty() {
            return Err(CommonError::config_field("log_tag", "must not be empty").into());
        }
        Ok(())
    }
}

/// Builder for CacheConfig with fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retention window
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.config.ttl = duration;
        self
    }

    pub fn expiry(mut self, policy: ExpiryPolicy) -> Self {
        self.config.expiry = policy;
        self
    }

    /// Enable or disable the persister read-through on a memory miss
    pub fn read_through_persister(mut self, enabled: bool) -> Self {
        self.config.read_through_persister = enabled;
        self
    }

    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.config.debug_logging = enabled;
        self
    }

    pub fn log_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.log_tag = tag.into();
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// See [`CacheConfig::validate`].
    pub fn build(self) -> CacheResult<CacheConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
