//! Time abstractions
//!
//! - [`clock`]: the `Clock` trait with a real and a mock implementation, so
//!   TTL behaviour can be tested without sleeping
//! - [`duration`]: parsing of human-readable durations such as `"30s"` or
//!   `"1h 30m"` used by configuration files
//!
//! ```rust
//! use std::time::Duration;
//!
//! use recache_common::time::{parse_duration, Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let before = clock.now();
//! clock.advance(parse_duration("1m 30s").unwrap());
//! assert_eq!(clock.now() - before, Duration::from_secs(90));
//! ```

pub mod clock;
pub mod duration;

pub use clock::{Clock, MockClock, SystemClock};
pub use duration::{parse_duration, DurationParseError};
