//! # Time Helpers
//!
//! Nodes carry signed unix seconds. The helpers here are the only place the
//! system clock is read so that callers agree on the unit.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unix timestamp in whole seconds.
pub type UnixTime = i64;

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// How far back a sync request may reach (14 days).
pub const SYNC_WINDOW: Duration = Duration::from_secs(14 * SECONDS_PER_DAY as u64);

/// Current unix time in seconds.
pub fn unix_now() -> UnixTime {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Unix time `window` before `now`.
pub fn unix_before(now: UnixTime, window: Duration) -> UnixTime {
    now.saturating_sub(window.as_secs() as i64)
}

/// Oldest point a sync may reach from `now`.
pub fn sync_floor(now: UnixTime) -> UnixTime {
    unix_before(now, SYNC_WINDOW)
}
