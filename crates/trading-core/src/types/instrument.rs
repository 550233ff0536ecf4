//! Instrument metadata.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tradeable instrument. Defined once at process start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Identifier, e.g. `EUR_USD`
    pub symbol: String,
    /// Smallest quoted increment
    pub pip_size: Decimal,
    /// Decimal places used when rounding prices
    pub price_precision: u32,
    /// Decimal places used when rounding quantities down
    pub quantity_precision: u32,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, pip_size: Decimal, price_precision: u32, quantity_precision: u32) -> Self {
        Self {
            symbol: symbol.into(),
            pip_size,
            price_precision,
            quantity_precision,
        }
    }

    /// A five-decimal FX pair traded in whole units.
    pub fn forex(symbol: impl Into<String>) -> Self {
        Self::new(symbol, dec!(0.0001), 5, 0)
    }

    /// Convert a spread expressed in pips into price units.
    pub fn pips_to_price(&self, pips: Decimal) -> Decimal {
        pips * self.pip_size
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}
