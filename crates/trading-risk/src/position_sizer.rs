//! Position sizing.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trading_core::error::TradeError;
use trading_core::traits::PositionSizing;
use trading_core::types::numeric::{checked_div, checked_mul, round_down, round_to};
use trading_core::types::{Account, Direction, Instrument};

/// Quantity and protective levels for a new position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizedPosition {
    pub quantity: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

/// Turns a [`PositionSizing`] request into a concrete position.
#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    max_quantity: Option<Decimal>,
}

impl PositionSizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap every computed quantity.
    pub fn with_max_quantity(mut self, max: Decimal) -> Self {
        self.max_quantity = Some(max);
        self
    }

    /// Size a position entered at `entry_price`.
    ///
    /// Risk-based quantities are `basis × risk% / stop distance`, rounded down
    /// to the instrument's quantity precision. A zero or negative quantity or
    /// stop distance is an [`TradeError::InvalidTrade`].
    pub fn size(
        &self,
        instrument: &Instrument,
        account: &Account,
        direction: Direction,
        entry_price: Decimal,
        sizing: &PositionSizing,
    ) -> Result<SizedPosition, TradeError> {
        let sign = direction.sign();

        let sized = match sizing {
            PositionSizing::Fixed {
                quantity,
                stop_loss,
                take_profit,
            } => {
                if let Some(sl) = stop_loss {
                    let distance = (entry_price - *sl) * sign;
                    if distance <= Decimal::ZERO {
                        return Err(TradeError::InvalidTrade(format!(
                            "stop loss {} is not on the losing side of entry {} for a {} trade",
                            sl, entry_price, direction
                        )));
                    }
                }
                if let Some(tp) = take_profit {
                    if (*tp - entry_price) * sign <= Decimal::ZERO {
                        return Err(TradeError::InvalidTrade(format!(
                            "take profit {} is not on the winning side of entry {} for a {} trade",
                            tp, entry_price, direction
                        )));
                    }
                }
                SizedPosition {
                    quantity: *quantity,
                    stop_loss: *stop_loss,
                    take_profit: *take_profit,
                }
            }

            PositionSizing::RiskBased {
                risk_percent,
                basis,
                stop_distance,
                reward_ratio,
            } => {
                if *stop_distance <= Decimal::ZERO {
                    return Err(TradeError::InvalidTrade(format!(
                        "stop distance must be positive, got {}",
                        stop_distance
                    )));
                }
                if *risk_percent <= Decimal::ZERO {
                    return Err(TradeError::InvalidTrade(format!(
                        "risk percent must be positive, got {}",
                        risk_percent
                    )));
                }

                let risk_amount = checked_mul(basis.amount(account), *risk_percent / dec!(100))?;
                let raw_quantity = checked_div(risk_amount, *stop_distance)?;
                let quantity = round_down(raw_quantity, instrument.quantity_precision);

                let stop_loss = round_to(entry_price - sign * *stop_distance, instrument.price_precision);
                let take_profit = match reward_ratio {
                    Some(ratio) => {
                        let reward = checked_mul(*stop_distance, *ratio)?;
                        Some(round_to(entry_price + sign * reward, instrument.price_precision))
                    }
                    None => None,
                };

                SizedPosition {
                    quantity,
                    stop_loss: Some(stop_loss),
                    take_profit,
                }
            }
        };

        let quantity = match self.max_quantity {
            Some(max) => sized.quantity.min(max),
            None => sized.quantity,
        };
        if quantity <= Decimal::ZERO {
            return Err(TradeError::InvalidTrade(format!(
                "position size must be positive, got {}",
                quantity
            )));
        }

        Ok(SizedPosition { quantity, ..sized })
    }
}
