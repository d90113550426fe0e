//! Query time ranges.

use chrono::{DateTime, Duration, Utc};

use crate::{Error, Result};

/// Named range used by history queries when none is given.
pub const DEFAULT_HISTORY_RANGE: &str = "24h";

/// Named range used by trend queries when none is given.
pub const DEFAULT_TREND_RANGE: &str = "7d";

/// Inclusive `[start, end]` window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Short label used in export file names.
    pub label: String,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(Error::invalid_range(format!(
                "start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self {
            start,
            end,
            label: "custom".to_string(),
        })
    }

    /// Window ending at `now` for a named range: `1h`, `6h`, `24h`, `7d`, `30d`.
    ///
    /// `1d` and the empty string are aliases for `24h`.
    pub fn named(name: &str, now: DateTime<Utc>) -> Result<Self> {
        let (span, label) = match name.trim() {
            "1h" => (Duration::hours(1), "1h"),
            "6h" => (Duration::hours(6), "6h"),
            "" | "1d" | "24h" => (Duration::hours(24), "24h"),
            "7d" => (Duration::days(7), "7d"),
            "30d" => (Duration::days(30), "30d"),
            other => {
                return Err(Error::invalid_range(format!(
                    "unknown range '{}', expected one of 1h, 6h, 24h, 7d, 30d",
                    other
                )));
            }
        };
        Ok(Self {
            start: now - span,
            end: now,
            label: label.to_string(),
        })
    }

    /// Resolve query parameters.
    ///
    /// Explicit `start`/`end` take precedence and must be given together.
    pub fn from_query(
        range: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        default_range: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        match (non_empty(start), non_empty(end)) {
            (Some(start), Some(end)) => Self::new(parse_timestamp(start)?, parse_timestamp(end)?),
            (None, None) => Self::named(range.unwrap_or(default_range), now),
            _ => Err(Error::invalid_range("start and end must be provided together")),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::invalid_range(format!("invalid timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_named_ranges() {
        let r = TimeRange::named("6h", now()).unwrap();
        assert_eq!(r.end - r.start, Duration::hours(6));

        for alias in ["", "1d", "24h"] {
            let r = TimeRange::named(alias, now()).unwrap();
            assert_eq!(r.end - r.start, Duration::hours(24));
            assert_eq!(r.label, "24h");
        }

        assert!(matches!(
            TimeRange::named("2w", now()),
            Err(Error::QueryRangeInvalid(_))
        ));
    }

    #[test]
    fn test_default_applies_when_range_missing() {
        let r = TimeRange::from_query(None, None, None, DEFAULT_TREND_RANGE, now()).unwrap();
        assert_eq!(r.end - r.start, Duration::days(7));
    }

    #[test]
    fn test_explicit_bounds() {
        let r = TimeRange::from_query(
            Some("1h"),
            Some("2025-05-01T00:00:00Z"),
            Some("2025-05-02T00:00:00+00:00"),
            DEFAULT_HISTORY_RANGE,
            now(),
        )
        .unwrap();
        assert_eq!(r.end - r.start, Duration::days(1));
        assert_eq!(r.label, "custom");
    }

    #[test]
    fn test_invalid_bounds() {
        let half = TimeRange::from_query(None, Some("2025-05-01T00:00:00Z"), None, "24h", now());
        assert!(matches!(half, Err(Error::QueryRangeInvalid(_))));

        let garbage = TimeRange::from_query(None, Some("yesterday"), Some("today"), "24h", now());
        assert!(matches!(garbage, Err(Error::QueryRangeInvalid(_))));

        let reversed = TimeRange::from_query(
            None,
            Some("2025-05-02T00:00:00Z"),
            Some("2025-05-01T00:00:00Z"),
            "24h",
            now(),
        );
        assert!(matches!(reversed, Err(Error::QueryRangeInvalid(_))));
    }
}
