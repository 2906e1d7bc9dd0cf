//! Daily call window evaluated in a configured IANA time zone.

use crate::{CoreError, CoreResult};
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Daily time range during which outbound calls may be placed.
///
/// `start` is inclusive and `end` is exclusive, both local to `tz`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallWindow {
    start: NaiveTime,
    end: NaiveTime,
    tz: Tz,
}

impl CallWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, tz: Tz) -> CoreResult<Self> {
        if start >= end {
            return Err(CoreError::InvalidConfig(format!(
                "call window start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end, tz })
    }

    /// Parse a window from `HH:MM` strings and an IANA zone name.
    pub fn parse(start: &str, end: &str, tz: &str) -> CoreResult<Self> {
        let parse_time = |value: &str| {
            NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
                CoreError::InvalidConfig(format!("invalid window time '{value}': {e}"))
            })
        };
        let tz: Tz = tz
            .trim()
            .parse()
            .map_err(|e| CoreError::InvalidConfig(format!("invalid time zone '{tz}': {e}")))?;

        Self::new(parse_time(start)?, parse_time(end)?, tz)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    fn local_time(&self, now: DateTime<Utc>) -> NaiveTime {
        now.with_timezone(&self.tz).time()
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = self.local_time(now);
        local >= self.start && local < self.end
    }

    pub fn is_past_end(&self, now: DateTime<Utc>) -> bool {
        self.local_time(now) >= self.end
    }

    /// The next instant, strictly after `now`, at which the window opens.
    ///
    /// On a DST gap the earliest valid local instant after the nominal start is used.
    pub fn next_start_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut date = now.with_timezone(&self.tz).date_naive();
        loop {
            let naive = date.and_time(self.start);
            let candidate = match self.tz.from_local_datetime(&naive).earliest() {
                Some(local) => local.with_timezone(&Utc),
                None => {
                    let shifted = naive + ChronoDuration::hours(1);
                    match self.tz.from_local_datetime(&shifted).earliest() {
                        Some(local) => local.with_timezone(&Utc),
                        None => Utc.from_utc_datetime(&naive),
                    }
                }
            };
            if candidate > now {
                return candidate;
            }
            date = date.succ_opt().unwrap_or(date);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn open_between_start_and_end_in_local_time() {
        let window = CallWindow::parse("09:00", "17:00", "Asia/Seoul").unwrap();
        // 10:00 in Seoul.
        assert!(window.is_open(utc("2026-03-02T01:00:00Z")));
        // 08:59 in Seoul.
        assert!(!window.is_open(utc("2026-03-01T23:59:00Z")));
        // 17:00 in Seoul is closed and past end.
        assert!(!window.is_open(utc("2026-03-02T08:00:00Z")));
        assert!(window.is_past_end(utc("2026-03-02T08:00:00Z")));
    }

    #[test]
    fn rejects_inverted_window() {
        assert!(CallWindow::parse("17:00", "09:00", "UTC").is_err());
        assert!(CallWindow::parse("09:00", "17:00", "Mars/Olympus").is_err());
    }

    #[test]
    fn next_start_rolls_over_to_tomorrow() {
        let window = CallWindow::parse("09:00", "17:00", "UTC").unwrap();
        assert_eq!(
            window.next_start_after(utc("2026-03-02T08:00:00Z")),
            utc("2026-03-02T09:00:00Z")
        );
        assert_eq!(
            window.next_start_after(utc("2026-03-02T09:00:00Z")),
            utc("2026-03-03T09:00:00Z")
        );
    }

    #[test]
    fn next_start_respects_daylight_saving() {
        let window = CallWindow::parse("09:00", "17:00", "Europe/London").unwrap();
        // After the clocks go forward, 09:00 local is 08:00 UTC.
        assert_eq!(
            window.next_start_after(utc("2026-03-30T00:00:00Z")),
            utc("2026-03-30T08:00:00Z")
        );
    }
}
