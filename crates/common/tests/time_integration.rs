//! Integration tests for time utilities
//!
//! Exercises the clock abstraction the way the cache engine uses it: TTL
//! windows parsed from configuration strings and checked against a mock
//! clock.

use std::sync::Arc;
use std::time::Duration;

use recache_common::{parse_duration, Clock, MockClock, SystemClock};

/// Verifies that a parsed TTL and a shared mock clock agree on expiry.
///
/// # Test Steps
/// 1. Parse `"1s"` as the TTL
/// 2. Stamp an instant, advance a clone of the clock by 2s
/// 3. Verify the elapsed time exceeds the TTL as seen through the original
#[test]
fn test_parsed_ttl_against_mock_clock() {
    let ttl = parse_duration("1s").unwrap();
    let clock = MockClock::new();
    let handle = clock.clone();

    let stamped = clock.now();
    handle.advance(Duration::from_secs(2));

    assert!(clock.now().saturating_duration_since(stamped) > ttl);
}

#[test]
fn test_clock_behind_arc() {
    let clock: Arc<MockClock> = Arc::new(MockClock::new());
    let start = clock.now();
    clock.advance(Duration::from_millis(250));

    assert_eq!(Clock::now(&clock) - start, Duration::from_millis(250));
}

#[test]
fn test_system_clock_is_monotonic() {
    let clock = SystemClock;
    let first = clock.now();
    let second = clock.now();
    assert!(second >= first);
    assert!(clock.since(second) < Duration::from_secs(60));
}

#[test]
fn test_duration_strings_from_config_files() {
    assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    assert_eq!(parse_duration("1m 30s").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_duration("750ms").unwrap(), Duration::from_millis(750));
    assert!(parse_duration("forever").is_err());
    assert!(parse_duration("").is_err());
}
