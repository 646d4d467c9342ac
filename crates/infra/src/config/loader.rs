//! Configuration loader
//!
//! Loads [`Settings`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `RECACHE_TTL_MS` is not set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//! 5. Without any file, the defaults are used
//!
//! ## Environment Variables
//! - `RECACHE_TTL_MS`: Retention window in milliseconds (required for the
//!   environment source)
//! - `RECACHE_EXPIRY`: `per_entry` or `extend_on_write`
//! - `RECACHE_READ_THROUGH`: Consult the persister on a miss (true/false)
//! - `RECACHE_DEBUG_LOGGING`: Emit per-operation debug lines (true/false)
//! - `RECACHE_LOG_TAG`: Tag attached to cache log lines
//! - `RECACHE_PERSIST_DIR`: Directory for the file persister
//! - `RECACHE_LOG_LEVEL`: Default tracing level
//! - `RECACHE_LOG_FORMAT`: `compact` or `json`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./recache.toml` or `./recache.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use recache_common::{CommonError, CommonResult};

use super::settings::{LogFormat, Settings};

const CONFIG_FILE_NAMES: [&str; 4] = ["recache.toml", "recache.json", "config.toml", "config.json"];

/// Load settings with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variable is missing, falls back to the first config file found, then to
/// the defaults.
///
/// # Errors
/// Returns `CommonError::Config` if a source is present but invalid.
pub fn load() -> CommonResult<Settings> {
    match load_from_env() {
        Ok(settings) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(settings)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            match probe_config_paths() {
                Some(path) => load_from_file(Some(path)),
                None => {
                    tracing::info!("No config file found, using defaults");
                    Ok(Settings::default())
                }
            }
        }
    }
}

/// Load settings from environment variables
///
/// `RECACHE_TTL_MS` must be present; every other variable is optional and
/// falls back to its default.
///
/// # Errors
/// Returns `CommonError::Config` if the required variable is missing or a
/// variable has an invalid value.
pub fn load_from_env() -> CommonResult<Settings> {
    let ttl_ms = env_var("RECACHE_TTL_MS").and_then(|s| {
        s.trim()
            .parse::<u64>()
            .map_err(|e| CommonError::config_field("RECACHE_TTL_MS", format!("Invalid TTL: {e}")))
    })?;

    let mut settings = Settings::default();
    settings.cache.ttl = format!("{ttl_ms}ms");

    if let Ok(expiry) = std::env::var("RECACHE_EXPIRY") {
        settings.cache.expiry = expiry;
    }
    settings.cache.read_through = env_bool("RECACHE_READ_THROUGH", settings.cache.read_through);
    settings.cache.debug_logging = env_bool("RECACHE_DEBUG_LOGGING", settings.cache.debug_logging);
    if let Ok(tag) = std::env::var("RECACHE_LOG_TAG") {
        settings.cache.log_tag = tag;
    }

    settings.persistence.directory = std::env::var_os("RECACHE_PERSIST_DIR").map(PathBuf::from);

    if let Ok(level) = std::env::var("RECACHE_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Ok(format) = std::env::var("RECACHE_LOG_FORMAT") {
        settings.logging.format = LogFormat::parse(&format).ok_or_else(|| {
            CommonError::config_field("RECACHE_LOG_FORMAT", format!("Unknown log format: {format}"))
        })?;
    }

    Ok(settings)
}

/// Load settings from a file
///
/// If `path` is `None`, probes the standard locations.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CommonError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> CommonResult<Settings> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CommonError::config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CommonError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CommonError::config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse settings from string content, format detected by file extension.
fn parse_config(contents: &str, path: &Path) -> CommonResult<Settings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CommonError::config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CommonError::config(format!("Invalid JSON format: {e}"))),
        _ => Err(CommonError::config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// Searches the current working directory first, then the directory of the
/// running executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> CommonResult<String> {
    std::env::var(key)
        .map_err(|_| CommonError::config(format!("Missing required environment variable: {key}")))
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
