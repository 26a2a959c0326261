//! Trailing-window arithmetic shared by the calculator and the aggregator.
//!
//! Kept as a pure function of (now, window_days) so scoring stays
//! deterministic under test; production call sites pass `Utc::now()`.

use chrono::{DateTime, Duration, Utc};

/// Lower bound of the trailing window ending at `now`. Anomalies reported at
/// or after this instant are in scope; older ones are not.
pub fn start(now: DateTime<Utc>, window_days: i64) -> DateTime<Utc> {
    now - Duration::days(window_days)
}
