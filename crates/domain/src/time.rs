//! Time and timestamp helpers.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

/// UTC timestamp used for record timestamps, schedule ticks and fire times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Truncate a timestamp to the start of its minute.
#[must_use]
pub fn floor_minute(ts: Timestamp) -> Timestamp {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}
