//! Testing utilities shared by the integration suites
//!
//! - [`async_utils`]: timeouts and condition polling for async tests
//! - `MockClock` is re-exported so tests only need one import path

pub mod async_utils;

pub use async_utils::{poll_until, timeout_ok};
pub use crate::time::{Clock, MockClock, SystemClock};
