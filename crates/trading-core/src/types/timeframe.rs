//! Bar periods and period-bucket arithmetic.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Period of a bar.
///
/// Buckets are aligned to the Unix epoch, so every period boundary is a whole
/// multiple of the period length in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[serde(rename = "1s")]
    Second1,
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    #[default]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Daily,
}

impl Timeframe {
    /// Length of the period in milliseconds.
    pub fn as_millis(&self) -> i64 {
        let secs: i64 = match self {
            Timeframe::Second1 => 1,
            Timeframe::Minute1 => 60,
            Timeframe::Minute5 => 300,
            Timeframe::Minute15 => 900,
            Timeframe::Minute30 => 1800,
            Timeframe::Hour1 => 3600,
            Timeframe::Hour4 => 14400,
            Timeframe::Daily => 86400,
        };
        secs * 1000
    }

    pub fn as_duration(&self) -> Duration {
        Duration::milliseconds(self.as_millis())
    }

    /// Start of the bucket containing `ts`.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let ms = ts.timestamp_millis();
        let start = ms - ms.rem_euclid(self.as_millis());
        Utc.timestamp_millis_opt(start).single().unwrap_or(ts)
    }

    /// Last millisecond belonging to the bucket containing `ts`.
    pub fn bucket_end(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        self.bucket_start(ts) + self.as_duration() - Duration::milliseconds(1)
    }

    /// Inclusive close time of a bar opened at `open_time`.
    pub fn close_time(&self, open_time: DateTime<Utc>) -> DateTime<Utc> {
        open_time + self.as_duration() - Duration::milliseconds(1)
    }

    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::Second1,
            Timeframe::Minute1,
            Timeframe::Minute5,
            Timeframe::Minute15,
            Timeframe::Minute30,
            Timeframe::Hour1,
            Timeframe::Hour4,
            Timeframe::Daily,
        ]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::Second1 => "1s",
            Timeframe::Minute1 => "1m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Daily => "1d",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1s" | "s1" => Ok(Timeframe::Second1),
            "1m" | "m1" | "1min" => Ok(Timeframe::Minute1),
            "5m" | "m5" | "5min" => Ok(Timeframe::Minute5),
            "15m" | "m15" | "15min" => Ok(Timeframe::Minute15),
            "30m" | "m30" | "30min" => Ok(Timeframe::Minute30),
            "1h" | "h1" | "hour" => Ok(Timeframe::Hour1),
            "4h" | "h4" => Ok(Timeframe::Hour4),
            "1d" | "d1" | "daily" => Ok(Timeframe::Daily),
            _ => Err(format!("Invalid timeframe: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_bucket_alignment() {
        let tf = Timeframe::Minute1;
        assert_eq!(tf.bucket_start(at(61_500)), at(60_000));
        assert_eq!(tf.bucket_end(at(61_500)), at(119_999));
        assert_eq!(tf.bucket_start(at(60_000)), at(60_000));
        assert_eq!(tf.close_time(at(60_000)), at(119_999));
    }

    #[test]
    fn test_timeframe_parse_and_display() {
        assert_eq!(Timeframe::from_str("M15").unwrap(), Timeframe::Minute15);
        assert_eq!(Timeframe::from_str("daily").unwrap(), Timeframe::Daily);
        assert!(Timeframe::from_str("1w").is_err());
        for tf in Timeframe::all() {
            assert_eq!(Timeframe::from_str(&tf.to_string()).unwrap(), *tf);
        }
    }
}
