//! Broker trading-day arithmetic.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Maps instants to broker trading days.
///
/// A trading day starts at `day_start` broker-local wall time. The start of
/// the day containing `now` is the most recent such instant that is `<= now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingCalendar {
    pub timezone: Tz,
    pub day_start: NaiveTime,
}

impl TradingCalendar {
    pub fn new(timezone: Tz, day_start: NaiveTime) -> Self {
        Self { timezone, day_start }
    }

    /// Calendar days starting at UTC midnight.
    pub fn utc() -> Self {
        Self::new(chrono_tz::UTC, NaiveTime::MIN)
    }

    /// Start of the trading day containing `now`.
    pub fn day_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.timezone).date_naive();
        let candidate = self.localize(today.and_time(self.day_start));
        if candidate <= now {
            return candidate;
        }
        let yesterday = today.pred_opt().unwrap_or(today);
        self.localize(yesterday.and_time(self.day_start))
    }

    /// Broker-local date that labels the trading day containing `now`.
    pub fn trading_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.day_start(now).with_timezone(&self.timezone).date_naive()
    }

    /// Ambiguous wall times (DST fall-back) take the earliest instant; wall
    /// times skipped by a DST gap roll forward by the gap.
    fn localize(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => {
                let shifted = naive + Duration::hours(1);
                self.timezone
                    .from_local_datetime(&shifted)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
            }
        }
    }
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_utc_midnight_days() {
        let cal = TradingCalendar::utc();
        assert_eq!(cal.day_start(utc("2024-03-05T13:00:00Z")), utc("2024-03-05T00:00:00Z"));
        assert_eq!(cal.day_start(utc("2024-03-05T00:00:00Z")), utc("2024-03-05T00:00:00Z"));
    }

    #[test]
    fn test_new_york_five_pm_rollover() {
        let cal = TradingCalendar::new(chrono_tz::America::New_York, NaiveTime::from_hms_opt(17, 0, 0).unwrap());

        // 16:59 New York (EST, UTC-5) still belongs to the day that began the previous evening
        let before = utc("2024-01-10T21:59:00Z");
        assert_eq!(cal.day_start(before), utc("2024-01-09T22:00:00Z"));

        let after = utc("2024-01-10T22:00:00Z");
        assert_eq!(cal.day_start(after), utc("2024-01-10T22:00:00Z"));
        assert_eq!(cal.trading_date(after), NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    }

    #[test]
    fn test_day_start_is_monotonic_across_dst() {
        let cal = TradingCalendar::new(chrono_tz::Europe::London, NaiveTime::from_hms_opt(1, 30, 0).unwrap());
        let mut previous = cal.day_start(utc("2024-03-29T12:00:00Z"));
        for hour in 0..96 {
            let now = utc("2024-03-29T12:00:00Z") + Duration::hours(hour);
            let start = cal.day_start(now);
            assert!(start <= now);
            assert!(start >= previous);
            previous = start;
        }
    }
}
