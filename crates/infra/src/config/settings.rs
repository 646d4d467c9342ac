use std::path::PathBuf;

use recache_common::{parse_duration, CommonError};
use recache_core::{CacheConfig, CacheResult, ExpiryPolicy};
use serde::{Deserialize, Serialize};

/// Top-level settings for a recache host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub persistence: PersistenceSettings,
    pub logging: LogSettings,
}

/// Cache section. Durations use the human-readable form (`"30s"`,
/// `"1m 30s"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl: String,
    /// `per_entry` or `extend_on_write`
    pub expiry: String,
    pub read_through: bool,
    pub debug_logging: bool,
    pub log_tag: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            ttl: format!("{}s", defaults.ttl.as_secs()),
            expiry: "per_entry".to_string(),
            read_through: defaults.read_through_persister,
            debug_logging: defaults.debug_logging,
            log_tag: defaults.log_tag,
        }
    }
}

/// Durable tier section. Without a directory the registry runs memory-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    pub directory: Option<PathBuf>,
}

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default level directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl Settings {
    /// Convert the cache section into a validated [`CacheConfig`].
    ///
    /// # Errors
    /// Returns [`recache_core::CacheError::Config`] for an unparsable TTL or
    /// expiry policy, or when the resulting configuration is invalid.
    pub fn cache_config(&self) -> CacheResult<CacheConfig> {
        let ttl = parse_duration(&self.cache.ttl)
            .map_err(|err| CommonError::config_field("cache.ttl", err.to_string()))?;
        let expiry = ExpiryPolicy::parse(&self.cache.expiry).ok_or_else(|| {
            CommonError::config_field(
                "cache.expiry",
                format!("unknown expiry policy '{}'", self.cache.expiry),
            )
        })?;

        CacheConfig::builder()
            .ttl(ttl)
            .expiry(expiry)
            .read_through_persister(self.cache.read_through)
            .debug_logging(self.cache.debug_logging)
            .log_tag(self.cache.log_tag.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use recache_core::CacheError;

    use super::*;

    #[test]
    fn test_default_settings_convert() {
        let config = Settings::default().cache_config().unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    /// Validates conversion of every cache field.
    #[test]
    fn test_cache_config_conversion() {
        let settings = Settings {
            cache: CacheSettings {
                ttl: "1m 30s".to_string(),
                expiry: "extend_on_write".to_string(),
                read_through: false,
                debug_logging: true,
                log_tag: "feeds".to_string(),
            },
            ..Settings::default()
        };

        let config = settings.cache_config().unwrap();
        assert_eq!(config.ttl, Duration::from_secs(90));
        assert_eq!(config.expiry, ExpiryPolicy::ExtendOnWrite);
        assert!(!config.read_through_persister);
        assert!(config.debug_logging);
        assert_eq!(config.log_tag, "feeds");
    }

    #[test]
    fn test_invalid_ttl_is_a_config_error() {
        let mut settings = Settings::default();
        settings.cache.ttl = "soon".to_string();

        let err = settings.cache_config().unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
        assert!(err.to_string().contains("cache.ttl"));
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let mut settings = Settings::default();
        settings.cache.ttl = "0s".to_string();
        assert!(settings.cache_config().is_err());
    }

    #[test]
    fn test_unknown_expiry_is_rejected() {
        let mut settings = Settings::default();
        settings.cache.expiry = "lru".to_string();
        assert!(settings.cache_config().unwrap_err().to_string().contains("cache.expiry"));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("pretty"), None);
    }
}
