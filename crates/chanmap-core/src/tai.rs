//! TAI timestamps in `<seconds>:<nanoseconds>` form
//!
//! Relative activation offsets use the same notation (`"2:0"` is two
//! seconds from receipt).

use crate::TAI_UTC_OFFSET_SECS;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid timestamp {0:?}, expected <seconds>:<nanoseconds>")]
pub struct TimestampParseError(pub String);

/// Seconds and nanoseconds since the TAI epoch, or a relative offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }

    /// TAI equivalent of a UTC instant
    pub fn from_utc(utc: DateTime<Utc>) -> Self {
        Self {
            secs: utc.timestamp() + TAI_UTC_OFFSET_SECS,
            nanos: utc.timestamp_subsec_nanos(),
        }
    }

    /// Current TAI time
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Offset notation for a duration (`2s` -> `2:0`)
    pub fn from_duration(d: Duration) -> Self {
        Self {
            secs: d.as_secs() as i64,
            nanos: d.subsec_nanos(),
        }
    }

    /// Duration represented by an offset; negative values clamp to zero
    pub fn to_duration(self) -> Duration {
        if self.secs < 0 {
            return Duration::ZERO;
        }
        Duration::new(self.secs as u64, self.nanos)
    }

    pub fn checked_add(self, d: Duration) -> Option<Self> {
        let mut secs = self.secs.checked_add(i64::try_from(d.as_secs()).ok()?)?;
        let mut nanos = self.nanos + d.subsec_nanos();
        if nanos >= 1_000_000_000 {
            nanos -= 1_000_000_000;
            secs = secs.checked_add(1)?;
        }
        Some(Self { secs, nanos })
    }

    /// Time left from `self` until `later`, zero when already passed
    pub fn until(self, later: Timestamp) -> Duration {
        let diff = (i128::from(later.secs) * 1_000_000_000 + i128::from(later.nanos))
            - (i128::from(self.secs) * 1_000_000_000 + i128::from(self.nanos));
        if diff <= 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(u64::try_from(diff).unwrap_or(u64::MAX))
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.secs, self.nanos)
    }
}

impl FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TimestampParseError(s.to_string());
        let (secs, nanos) = s.split_once(':').ok_or_else(err)?;
        let secs: i64 = secs.parse().map_err(|_| err())?;
        let nanos: u32 = nanos.parse().map_err(|_| err())?;
        if nanos >= 1_000_000_000 {
            return Err(err());
        }
        Ok(Self { secs, nanos })
    }
}

/// TAI time `offset` from now, formatted for `activate_scheduled_absolute`
pub fn tai_time(offset: Duration) -> String {
    let now = Timestamp::now();
    now.checked_add(offset).unwrap_or(now).to_string()
}

/// Relative offset formatted for `activate_scheduled_relative`
pub fn relative_offset(offset: Duration) -> String {
    Timestamp::from_duration(offset).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_relative_offset_format() {
        assert_eq!(relative_offset(Duration::from_secs(2)), "2:0");
        assert_eq!(relative_offset(Duration::from_millis(1500)), "1:500000000");
    }

    #[test]
    fn test_parse_round_trip() {
        let ts: Timestamp = "1546300837:250000000".parse().unwrap();
        assert_eq!(ts, Timestamp::new(1_546_300_837, 250_000_000));
        assert_eq!(ts.to_string(), "1546300837:250000000");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("2".parse::<Timestamp>().is_err());
        assert!("a:0".parse::<Timestamp>().is_err());
        assert!("1:1000000000".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_utc_to_tai_adds_leap_seconds() {
        let utc = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let tai = Timestamp::from_utc(utc);
        assert_eq!(tai.secs, utc.timestamp() + 37);
        assert_eq!(tai.nanos, 0);
    }

    #[test]
    fn test_checked_add_carries_nanos() {
        let ts = Timestamp::new(10, 900_000_000);
        let later = ts.checked_add(Duration::from_millis(200)).unwrap();
        assert_eq!(later, Timestamp::new(11, 100_000_000));
        assert_eq!(ts.until(later), Duration::from_millis(200));
        assert_eq!(later.until(ts), Duration::ZERO);
    }

    #[test]
    fn test_tai_time_is_in_future() {
        let before = Timestamp::now();
        let scheduled: Timestamp = tai_time(Duration::from_secs(2)).parse().unwrap();
        assert!(before.until(scheduled) >= Duration::from_millis(1900));
    }
}
