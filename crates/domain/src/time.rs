//! Time and timestamp helpers.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// UTC timestamp used for queue, start, finish and fire instants.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Wall-clock distance from `from` to `until`, clamped to zero when `until`
/// is already in the past.
#[must_use]
pub fn delay_until(from: Timestamp, until: Timestamp) -> Duration {
    (until - from).to_std().unwrap_or(Duration::ZERO)
}

/// `now - age`, saturating at the minimum representable timestamp.
#[must_use]
pub fn ago(age: Duration) -> Timestamp {
    let now = now();
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
