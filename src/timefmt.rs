//! Relative "time since published" labels

use chrono::{DateTime, Utc};

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
const SECS_PER_MONTH: i64 = 30 * SECS_PER_DAY;
const SECS_PER_YEAR: i64 = 365 * SECS_PER_DAY;

/// Buckets from coarsest to finest; the first one that fits wins.
const BUCKETS: [(i64, &str); 6] = [
    (SECS_PER_YEAR, "year"),
    (SECS_PER_MONTH, "month"),
    (SECS_PER_DAY, "day"),
    (SECS_PER_HOUR, "hour"),
    (SECS_PER_MINUTE, "minute"),
    (1, "second"),
];

/// Render how long ago `published_at` was, relative to `now`.
///
/// Instants in the future are clamped to "now".
pub fn time_since(now: DateTime<Utc>, published_at: DateTime<Utc>) -> String {
    let elapsed = (now - published_at).num_seconds();

    for (unit_secs, unit) in BUCKETS {
        if elapsed >= unit_secs {
            let count = elapsed / unit_secs;
            return if count == 1 {
                format!("1 {} ago", unit)
            } else {
                format!("{} {}s ago", count, unit)
            };
        }
    }

    "now".to_string()
}
