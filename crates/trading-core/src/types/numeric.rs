//! Fixed-precision numeric helpers.
//!
//! Every price, quantity and money amount in the engine is a
//! [`rust_decimal::Decimal`]. The native operators cover add, subtract,
//! multiply, compare and `abs`; this module adds the operations whose failure
//! modes or rounding direction must be explicit.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ArithmeticError;

/// Divide `dividend` by `divisor`, failing on a zero divisor or overflow.
pub fn checked_div(dividend: Decimal, divisor: Decimal) -> Result<Decimal, ArithmeticError> {
    if divisor.is_zero() {
        return Err(ArithmeticError::DivisionByZero { dividend });
    }
    dividend
        .checked_div(divisor)
        .ok_or(ArithmeticError::Overflow("division"))
}

/// Multiply, failing on overflow.
pub fn checked_mul(lhs: Decimal, rhs: Decimal) -> Result<Decimal, ArithmeticError> {
    lhs.checked_mul(rhs)
        .ok_or(ArithmeticError::Overflow("multiplication"))
}

/// Round toward zero at `scale` decimal places.
///
/// Used for position sizing: a risk-based quantity must never round up past
/// the risk budget.
pub fn round_down(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::ToZero)
}

/// Round half away from zero at `scale` decimal places (prices).
pub fn round_to(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// Value equality after rounding both sides to `scale`.
pub fn eq_at_scale(a: Decimal, b: Decimal, scale: u32) -> bool {
    round_to(a, scale) == round_to(b, scale)
}

/// Convert an `f64` (config input, statistics) into a decimal.
pub fn from_f64(value: f64) -> Result<Decimal, ArithmeticError> {
    Decimal::try_from(value).map_err(|_| ArithmeticError::NotRepresentable(value.to_string()))
}

/// Lossy conversion used only for statistics that need `sqrt`.
pub fn to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}
