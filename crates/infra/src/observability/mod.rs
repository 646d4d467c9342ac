//! Tracing subscriber setup
//!
//! The cache engine logs through `tracing` (via its `TracingLogger` sink).
//! Hosts call [`init_tracing`] once at startup to install a subscriber with
//! an [`EnvFilter`] and a compact or JSON fmt layer.

use recache_common::{CommonError, CommonResult};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LogSettings};

/// Install the global tracing subscriber.
///
/// `settings.level` is the default directive; `RUST_LOG` overrides it.
///
/// # Errors
/// Returns `CommonError::Config` for an unknown level, or when a global
/// subscriber is already installed.
pub fn init_tracing(settings: &LogSettings) -> CommonResult<()> {
    let default_level = parse_log_level(&settings.level)?;

    let env_filter =
        EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match settings.format {
        LogFormat::Compact => registry.with(fmt::layer().compact().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
    };

    installed.map_err(|e| CommonError::config(format!("Tracing already initialized: {e}")))
}

/// Parse a level name (`trace`, `debug`, `info`, `warn`, `error`, `off`).
///
/// # Errors
/// Returns `CommonError::Config` naming the `logging.level` field.
pub fn parse_log_level(level: &str) -> CommonResult<LevelFilter> {
    level.trim().parse::<LevelFilter>().map_err(|_| {
        CommonError::config_field("logging.level", format!("Invalid log level: {level}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_log_level(" WARN ").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_log_level("off").unwrap(), LevelFilter::OFF);
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_invalid_level_fails_before_install() {
        let settings = LogSettings { level: "loud".to_string(), format: LogFormat::Compact };
        let err = init_tracing(&settings).unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    /// A second initialization is reported as an error, not a panic.
    #[test]
    fn test_second_init_is_rejected() {
        let settings = LogSettings::default();
        let _ = init_tracing(&settings);
        assert!(init_tracing(&settings).is_err());
    }
}
