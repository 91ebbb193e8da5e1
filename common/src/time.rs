// A simple module to define the time types used in the project
//
// Core operations never read the clock themselves: callers pass `now`
// explicitly so a scheduler or a test harness drives them deterministically.
// The helpers below are only used at the outer edge (binary, service defaults).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Millis timestamps used to determine it using its type
pub type TimestampMillis = u64;

// Seconds timestamps used to determine it using its type
pub type TimestampSeconds = u64;

pub const MILLIS_PER_SECOND: u64 = 1000;
pub const MILLIS_PER_HOUR: u64 = 60 * 60 * MILLIS_PER_SECOND;
pub const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;

#[inline]
pub fn get_current_time() -> Duration {
    // A clock set before 1970 is treated as the epoch itself
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

// Return timestamp in seconds
pub fn get_current_time_in_seconds() -> TimestampSeconds {
    get_current_time().as_secs()
}

// Return timestamp in milliseconds
// We cast it to u64 as we have plenty of time before it overflows (year 584,942,417 AD)
pub fn get_current_time_in_millis() -> TimestampMillis {
    get_current_time().as_millis() as TimestampMillis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(MILLIS_PER_DAY, 86_400_000);
        assert!(get_current_time_in_millis() / MILLIS_PER_SECOND >= get_current_time_in_seconds() - 1);
    }
}
