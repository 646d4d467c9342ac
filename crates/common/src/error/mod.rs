//! Shared error type and classification
//!
//! [`CommonError`] covers the failures that more than one crate can raise:
//! bad configuration, encoding problems and durable-tier I/O. Crate errors
//! wrap it (usually through `#[from]`) and implement [`ErrorClassification`]
//! with [`impl_error_classification!`](crate::impl_error_classification),
//! which forwards the wrapped variant to the impl below.
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, thiserror::Error)]
//! pub enum CacheError {
//!     #[error(transparent)]
//!     Config(#[from] CommonError),
//!
//!     #[error("fetch for key '{key}' was cancelled")]
//!     Cancelled { key: String },
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Result alias for fallible operations returning [`CommonError`]
pub type CommonResult<T> = Result<T, CommonError>;

/// Failure shared across the cache crates.
///
/// Each variant carries a human-readable message plus an optional
/// qualifier naming what failed (the config field, the encoding, the
/// persister operation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Invalid or missing settings, including a rejected TTL
    Config { message: String, field: Option<String> },

    /// A payload could not be encoded or decoded
    Serialization { message: String, format: Option<String> },

    /// The durable tier failed
    Persistence { message: String, operation: Option<String> },
}

impl CommonError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Configuration error attributed to `field`
    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    /// Persistence error raised by the persister operation `operation`
    pub fn persistence_op(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Config { message, .. }
            | Self::Serialization { message, .. }
            | Self::Persistence { message, .. } => message,
        }
    }

    /// Field, format or operation the error is attributed to.
    pub fn qualifier(&self) -> Option<&str> {
        match self {
            Self::Config { field, .. } => field.as_deref(),
            Self::Serialization { format, .. } => format.as_deref(),
            Self::Persistence { operation, .. } => operation.as_deref(),
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "configuration",
            Self::Serialization { .. } => "serialization",
            Self::Persistence { .. } => "persistence",
        }
    }
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.qualifier()) {
            (Self::Config { .. }, Some(field)) => write!(f, "invalid '{field}'")?,
            (Self::Serialization { .. }, Some(format)) => write!(f, "{format} {}", self.kind())?,
            (Self::Persistence { .. }, Some(op)) => write!(f, "{} '{op}'", self.kind())?,
            (_, None) => f.write_str(self.kind())?,
        }
        write!(f, " error: {}", self.message())
    }
}

impl std::error::Error for CommonError {}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization("toml", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

/// How loudly an error should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}

/// Uniform questions callers ask of an error before deciding what to do.
///
/// The cache never retries on its own; this is for the host.
pub trait ErrorClassification {
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    fn is_critical(&self) -> bool;

    /// Suggested delay before retrying, when the error knows one
    fn retry_after(&self) -> Option<Duration>;
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        // Disk hiccups pass, bad input does not
        matches!(self, Self::Persistence { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } | Self::Serialization { .. } => ErrorSeverity::Error,
            Self::Persistence { .. } => ErrorSeverity::Warning,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Implement [`ErrorClassification`] for an error enum that wraps
/// [`CommonError`] in a tuple variant.
///
/// The wrapped variant delegates; every other variant lists its answers
/// explicitly. `retry_after` defaults to `None` when omitted.
///
/// ```rust,ignore
/// impl_error_classification!(CacheError, Config,
///     Self::Cancelled { .. } => {
///         retryable: true,
///         severity: ErrorSeverity::Info,
///         critical: false,
///     },
/// );
/// ```
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(inner) => {
                        $crate::error::ErrorClassification::is_retryable(inner)
                    }
                    $( $variant => $retryable, )*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(inner) => $crate::error::ErrorClassification::severity(inner),
                    $( $variant => $severity, )*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(inner) => {
                        $crate::error::ErrorClassification::is_critical(inner)
                    }
                    $( $variant => $critical, )*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(inner) => {
                        $crate::error::ErrorClassification::retry_after(inner)
                    }
                    $( $( $variant => $retry_after, )? )*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}
