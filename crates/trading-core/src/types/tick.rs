//! Price observations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::Direction;

/// A single bid/ask observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument: String,
    pub bid: Decimal,
    pub mid: Decimal,
    pub ask: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    /// Build a tick from a bid/ask pair; mid is their average.
    pub fn from_quote(instrument: impl Into<String>, bid: Decimal, ask: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.into(),
            bid,
            mid: (bid + ask) / dec!(2),
            ask,
            timestamp,
        }
    }

    /// Build a tick around a mid price with a symmetric spread.
    pub fn from_mid(instrument: impl Into<String>, mid: Decimal, spread: Decimal, timestamp: DateTime<Utc>) -> Self {
        let half = spread / dec!(2);
        Self {
            instrument: instrument.into(),
            bid: mid - half,
            mid,
            ask: mid + half,
            timestamp,
        }
    }

    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Price at which a position in `direction` is opened.
    pub fn entry_price(&self, direction: Direction) -> Decimal {
        match direction {
            Direction::Long => self.ask,
            Direction::Short => self.bid,
        }
    }

    /// Price at which a position in `direction` is closed or marked.
    pub fn exit_price(&self, direction: Direction) -> Decimal {
        match direction {
            Direction::Long => self.bid,
            Direction::Short => self.ask,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_quote_sides() {
        let ts = Utc.timestamp_millis_opt(0).unwrap();
        let tick = Tick::from_mid("EUR_USD", dec!(1.1000), dec!(0.0002), ts);
        assert_eq!(tick.bid, dec!(1.0999));
        assert_eq!(tick.ask, dec!(1.1001));
        assert_eq!(tick.spread(), dec!(0.0002));
        assert_eq!(tick.entry_price(Direction::Long), tick.ask);
        assert_eq!(tick.exit_price(Direction::Long), tick.bid);
        assert_eq!(tick.entry_price(Direction::Short), tick.bid);

        let quoted = Tick::from_quote("EUR_USD", dec!(1.0999), dec!(1.1001), ts);
        assert_eq!(quoted.mid, dec!(1.1000));
    }
}
