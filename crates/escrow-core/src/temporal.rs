//! # Temporal Types
//!
//! UTC-only timestamps and the clock seam used by every time-gated check.
//!
//! Deadlines and grace windows are absolute [`Timestamp`]s fixed when a
//! ledger is created. Whether a deadline has passed is never scheduled; it
//! is a predicate evaluated against a [`Clock`] reading taken at call time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`]: current UTC time, truncated.
/// - [`Timestamp::from_utc()`]: from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`]: from an ISO8601 string, rejecting non-UTC offsets.
/// - [`Timestamp::from_epoch_secs()`]: from Unix seconds.
///
/// Deserialization goes through [`Timestamp::parse()`], so serialized input
/// obeys the same rules as parsed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a timestamp from an RFC 3339 string with a `Z` suffix.
    ///
    /// Explicit offsets, including `+00:00`, are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimestamp`] if the string is not
    /// RFC 3339 or does not end in `Z`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if !s.ends_with('Z') {
            return Err(ValidationError::InvalidTimestamp {
                value: s.to_string(),
                reason: "must use Z suffix (UTC only)".to_string(),
            });
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| ValidationError::InvalidTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// Create a timestamp from a Unix epoch timestamp (seconds).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimestamp`] if the value is outside
    /// the range `chrono` can represent.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, ValidationError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidTimestamp {
                value: secs.to_string(),
                reason: "out of range".to_string(),
            })
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Add a duration, returning `None` if the result is unrepresentable.
    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        self.0.checked_add_signed(duration).map(Self::from_utc)
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_iso8601()
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

// ── Clock ──────────────────────────────────────────────────────────────

/// Source of the current time for time-gated checks.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by [`Timestamp::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A manually driven clock.
///
/// Clones share the same instant, so a test can hand one clone to a
/// registry and keep another to move time forward.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Set the clock to an absolute instant. Moving backwards is allowed.
    pub fn set(&self, instant: Timestamp) {
        *self.now.lock() = instant;
    }

    /// Move the clock forward by `duration`.
    ///
    /// Returns the new instant, or `None` (leaving the clock unchanged) if
    /// the result would be unrepresentable.
    pub fn advance(&self, duration: Duration) -> Option<Timestamp> {
        let mut now = self.now.lock();
        let next = now.checked_add(duration)?;
        *now = next;
        Some(next)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn now_has_no_subseconds() {
        assert_eq!(Timestamp::now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 45).unwrap();
        let ts = Timestamp::from_utc(dt.with_nanosecond(123_456_789).unwrap());
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:30:45Z");
    }

    #[test]
    fn parse_rejects_offsets() {
        assert!(Timestamp::parse("2026-01-15T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("2026-01-15T17:00:00+05:00").is_err());
        assert!(Timestamp::parse("not-a-date").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn epoch_roundtrip() {
        let t = ts("2026-01-15T12:00:00Z");
        assert_eq!(Timestamp::from_epoch_secs(t.epoch_secs()).unwrap(), t);
    }

    #[test]
    fn ordering() {
        assert!(ts("2026-01-15T12:00:00Z") < ts("2026-01-15T12:00:01Z"));
    }

    #[test]
    fn checked_add_moves_forward() {
        let t = ts("2026-01-15T12:00:00Z");
        assert_eq!(
            t.checked_add(Duration::days(7)).unwrap(),
            ts("2026-01-22T12:00:00Z")
        );
    }

    #[test]
    fn checked_add_overflow_is_none() {
        let t = ts("2026-01-15T12:00:00Z");
        assert!(t.checked_add(Duration::days(400_000 * 365)).is_none());
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(ts("2026-01-15T12:00:00Z"));
        let handle = clock.clone();
        handle.advance(Duration::hours(2)).unwrap();
        assert_eq!(clock.now(), ts("2026-01-15T14:00:00Z"));
        clock.set(ts("2026-01-01T00:00:00Z"));
        assert_eq!(handle.now(), ts("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn system_clock_reads_truncated_wall_time() {
        assert_eq!(SystemClock.now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn serde_roundtrip() {
        let t = ts("2026-01-15T12:00:00Z");
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"2026-01-15T12:00:00Z\"");
        assert_eq!(serde_json::from_str::<Timestamp>(&json).unwrap(), t);
    }

    #[test]
    fn deserialize_applies_parse_rules() {
        let t: Timestamp = serde_json::from_str("\"2026-01-15T12:00:00.750Z\"").unwrap();
        assert_eq!(t, ts("2026-01-15T12:00:00Z"));
        assert_eq!(t.as_datetime().nanosecond(), 0);
        assert!(serde_json::from_str::<Timestamp>("\"2026-01-15T12:00:00+00:00\"").is_err());
        assert!(serde_json::from_str::<Timestamp>("\"2026-01-15\"").is_err());
    }
}
