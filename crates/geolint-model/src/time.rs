//! Timestamps, the run cutoff, and the "last change seen" tracker.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::error::ConfigError;

/// Last-change instant of an entity.
pub type Timestamp = DateTime<Utc>;

/// Parse `yyyy-mm-ddThh:mm:ssZ` (any RFC 3339 instant is accepted).
pub fn parse_timestamp(s: &str) -> Result<Timestamp, ConfigError> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ConfigError::InvalidTimestamp(s.to_string()))
}

/// ISO-8601 rendering used in feature fields and stats rows.
pub fn to_iso(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Only entities last changed strictly before this instant take part in a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cutoff {
    before: Option<Timestamp>,
}

impl Cutoff {
    /// No cutoff: every entity is admitted.
    pub const fn none() -> Self {
        Self { before: None }
    }

    pub fn before(ts: Timestamp) -> Self {
        Self { before: Some(ts) }
    }

    /// Admit entities at least `days` days older than `now`.
    pub fn min_age_days(days: u32, now: Timestamp) -> Self {
        Self::before(now - Duration::days(i64::from(days)))
    }

    /// Build the cutoff from the two mutually exclusive user options.
    pub fn from_options(
        before: Option<&str>,
        age_days: Option<u32>,
        now: Timestamp,
    ) -> Result<Self, ConfigError> {
        match (before, age_days) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingCutoff),
            (Some(ts), None) => Ok(Self::before(parse_timestamp(ts)?)),
            (None, Some(days)) => Ok(Self::min_age_days(days, now)),
            (None, None) => Ok(Self::none()),
        }
    }

    pub fn admits(&self, ts: Timestamp) -> bool {
        match self.before {
            Some(cutoff) => ts < cutoff,
            None => true,
        }
    }

    pub fn instant(&self) -> Option<Timestamp> {
        self.before
    }
}

/// Tracks the maximum entity timestamp seen during a run.
///
/// Stats rows are keyed by this value rather than wall-clock time, so that
/// re-running a check on the same extract produces the same key.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampTracker {
    latest: Option<Timestamp>,
}

impl TimestampTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, ts: Timestamp) {
        if self.latest.map_or(true, |latest| ts > latest) {
            self.latest = Some(ts);
        }
    }

    /// Latest timestamp seen, or the Unix epoch if nothing was observed.
    pub fn latest(&self) -> Timestamp {
        self.latest.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn cutoff_is_strict() {
        let cutoff = Cutoff::before(ts("2021-01-01T00:00:00Z"));
        assert!(cutoff.admits(ts("2020-12-31T23:59:59Z")));
        assert!(!cutoff.admits(ts("2021-01-01T00:00:00Z")));
        assert!(Cutoff::none().admits(ts("2999-01-01T00:00:00Z")));
    }

    #[test]
    fn cutoff_options_are_exclusive() {
        let now = ts("2022-01-11T00:00:00Z");
        assert_eq!(
            Cutoff::from_options(Some("2020-01-01T00:00:00Z"), Some(3), now),
            Err(ConfigError::ConflictingCutoff)
        );
        let by_age = Cutoff::from_options(None, Some(10), now).unwrap();
        assert_eq!(by_age.instant(), Some(ts("2022-01-01T00:00:00Z")));
        assert_eq!(Cutoff::from_options(None, None, now).unwrap(), Cutoff::none());
        assert!(matches!(
            Cutoff::from_options(Some("yesterday"), None, now),
            Err(ConfigError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn tracker_keeps_maximum() {
        let mut tracker = TimestampTracker::new();
        assert_eq!(to_iso(tracker.latest()), "1970-01-01T00:00:00Z");
        tracker.observe(ts("2020-06-01T00:00:00Z"));
        tracker.observe(ts("2020-01-01T00:00:00Z"));
        assert_eq!(to_iso(tracker.latest()), "2020-06-01T00:00:00Z");
    }
}
