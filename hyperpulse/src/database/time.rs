//! Timestamp helpers for the database layer.
//!
//! Timestamps are stored as `INTEGER` Unix epoch milliseconds (UTC).

use chrono::{DateTime, TimeZone, Utc};

#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[inline]
pub fn datetime_to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Like [`datetime_to_ms`] but rounds a sub-millisecond remainder up.
///
/// Used for inclusive lower bounds so rows before `dt` never match.
pub fn datetime_to_ms_ceil(dt: DateTime<Utc>) -> i64 {
    let ms = dt.timestamp_millis();
    if dt.timestamp_subsec_nanos() % 1_000_000 != 0 {
        ms.saturating_add(1)
    } else {
        ms
    }
}

/// Convert epoch milliseconds back to `DateTime<Utc>`.
///
/// Out-of-range values clamp to the Unix epoch instead of panicking.
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .earliest()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Cutoff for "older than `days` days" relative to `now`.
pub fn retention_cutoff_ms(now: DateTime<Utc>, days: u32) -> i64 {
    datetime_to_ms(now - chrono::Duration::days(i64::from(days)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_round_trip_keeps_millis() {
        let now = ms_to_datetime(1_700_000_000_123);
        assert_eq!(datetime_to_ms(now), 1_700_000_000_123);
    }

    #[test]
    fn test_lower_bound_rounds_up_sub_millis() {
        let exact = ms_to_datetime(1_700_000_000_123);
        assert_eq!(datetime_to_ms_ceil(exact), 1_700_000_000_123);

        let fractional = exact + chrono::Duration::microseconds(500);
        assert_eq!(datetime_to_ms(fractional), 1_700_000_000_123);
        assert_eq!(datetime_to_ms_ceil(fractional), 1_700_000_000_124);
    }

    #[test]
    fn test_retention_cutoff() {
        let now = ms_to_datetime(10 * 86_400_000);
        assert_eq!(retention_cutoff_ms(now, 3), 7 * 86_400_000);
    }
}
