//! Time utilities.
//!
//! Events carry epoch **seconds** as `f64` (sub-second precision in the
//! fraction). The database stores BSON datetimes, which are UTC milliseconds.

use std::time::{SystemTime, UNIX_EPOCH};

use bson::DateTime;

/// Current time as **seconds** since Unix epoch, with microsecond fraction.
///
/// Used as the receipt timestamp of events entering a feed.
#[inline]
pub fn now_secs() -> f64 {
    let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    d.as_secs() as f64 + f64::from(d.subsec_micros()) / 1_000_000.0
}

/// Convert epoch seconds to a UTC BSON datetime.
///
/// The value is first rounded to whole microseconds, then truncated to
/// milliseconds (BSON resolution). Zero and non-finite inputs return `None`,
/// which callers store as an explicit null.
pub fn secs_to_datetime(secs: f64) -> Option<DateTime> {
    if secs == 0.0 || !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round() as i64;
    Some(DateTime::from_millis(micros.div_euclid(1_000)))
}
