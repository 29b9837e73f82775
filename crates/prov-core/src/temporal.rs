//! # UTC-Only Timestamps
//!
//! `Timestamp` is UTC, truncated to seconds, and renders as
//! `YYYY-MM-DDTHH:MM:SSZ`. Anchored records embed timestamps, so a local
//! offset or sub-second noise would change the canonical bytes of an
//! otherwise identical record.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProvError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string. Only the `Z` suffix is accepted.
    pub fn parse(s: &str) -> Result<Self, ProvError> {
        if !s.ends_with('Z') {
            return Err(ProvError::Timestamp(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| ProvError::Timestamp(format!("invalid RFC 3339 timestamp {s:?}: {e}")))?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Midnight UTC at the start of `date`.
    pub fn start_of(date: NaiveDate) -> Self {
        Self(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// The calendar date of this instant in UTC.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Seconds since the Unix epoch.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Render as ISO 8601 with Z suffix.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn now_has_no_subseconds() {
        assert_eq!(Timestamp::now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn from_utc_truncates() {
        let dt = Utc
            .with_ymd_and_hms(2026, 3, 1, 8, 15, 30)
            .unwrap()
            .with_nanosecond(987_000_000)
            .unwrap();
        assert_eq!(Timestamp::from_utc(dt).to_iso8601(), "2026-03-01T08:15:30Z");
    }

    #[test]
    fn parse_accepts_z_and_rejects_offsets() {
        assert_eq!(
            Timestamp::parse("2026-03-01T08:15:30.5Z").unwrap().to_iso8601(),
            "2026-03-01T08:15:30Z"
        );
        assert!(Timestamp::parse("2026-03-01T08:15:30+00:00").is_err());
        assert!(Timestamp::parse("2026-03-01").is_err());
    }

    #[test]
    fn start_of_date_is_midnight() {
        let date = NaiveDate::from_ymd_opt(2027, 1, 31).unwrap();
        let ts = Timestamp::start_of(date);
        assert_eq!(ts.to_iso8601(), "2027-01-31T00:00:00Z");
        assert_eq!(ts.date(), date);
    }

    #[test]
    fn ordering_follows_time() {
        let a = Timestamp::parse("2026-03-01T08:15:30Z").unwrap();
        let b = Timestamp::parse("2026-03-01T08:15:31Z").unwrap();
        assert!(a < b);
    }

    #[test]
    fn serde_round_trip() {
        let ts = Timestamp::parse("2026-03-01T08:15:30Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(serde_json::from_str::<Timestamp>(&json).unwrap(), ts);
    }
}
