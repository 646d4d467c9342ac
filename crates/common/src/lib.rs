//! Foundation utilities shared across the recache crates.
//!
//! # Modules
//!
//! - [`error`]: `CommonError`, `ErrorClassification` and `ErrorSeverity`
//! - [`time`]: the `Clock` abstraction plus human-readable duration parsing
//! - [`testing`]: async helpers used by the integration suites

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod testing;
pub mod time;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
pub use time::{parse_duration, Clock, DurationParseError, MockClock, SystemClock};
