//! Strategy parameter metadata.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trading_core::error::StrategyError;
use trading_core::traits::{BalanceBasis, PositionSizing};
use trading_core::types::Instrument;

/// Describes one tunable strategy parameter.
///
/// The same table drives validation, listing and optimisation grids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Whole-number parameter (periods, counts)
    #[serde(default)]
    pub integer: bool,
}

impl ParameterSpec {
    pub fn integer(name: &str, description: &str, default: i64, min: i64, max: i64, step: i64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            default: default as f64,
            min: min as f64,
            max: max as f64,
            step: step as f64,
            integer: true,
        }
    }

    pub fn decimal(name: &str, description: &str, default: f64, min: f64, max: f64, step: f64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            default,
            min,
            max,
            step,
            integer: false,
        }
    }

    /// JSON value for `value`, typed the way the params struct expects it.
    pub fn json_value(&self, value: f64) -> Value {
        if self.integer {
            Value::from(value.round() as i64)
        } else {
            // Strip binary noise such as 0.30000000000000004
            let rounded = (value * 1e8).round() / 1e8;
            Value::from(rounded)
        }
    }

    /// Every value from `min` to `max` inclusive in `step` increments.
    pub fn grid(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.max < self.min {
            return vec![self.default];
        }
        let steps = ((self.max - self.min) / self.step + 1e-9).floor() as usize;
        (0..=steps).map(|i| self.min + self.step * i as f64).collect()
    }

    pub fn check(&self, value: &Value) -> Result<(), StrategyError> {
        let Some(number) = value.as_f64() else {
            return Err(self.invalid(format!("expected a number, got {}", value)));
        };
        if self.integer && number.fract() != 0.0 {
            return Err(self.invalid(format!("{} is not a whole number", number)));
        }
        if number < self.min || number > self.max {
            return Err(self.invalid(format!("{} outside [{}, {}]", number, self.min, self.max)));
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> StrategyError {
        StrategyError::InvalidParameter {
            name: self.name.clone(),
            reason,
        }
    }
}

/// Default parameter object built from a spec table.
pub fn defaults(specs: &[ParameterSpec]) -> Value {
    let map: Map<String, Value> = specs
        .iter()
        .map(|s| (s.name.clone(), s.json_value(s.default)))
        .collect();
    Value::Object(map)
}

/// Overlay `overrides` on the defaults and range-check every known key.
///
/// Keys without a spec are passed through for the params struct to accept
/// or reject.
pub fn resolve(specs: &[ParameterSpec], overrides: &Value) -> Result<Value, StrategyError> {
    let mut merged = match defaults(specs) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    match overrides {
        Value::Null => {}
        Value::Object(map) => {
            for (key, value) in map {
                merged.insert(key.clone(), value.clone());
            }
        }
        other => {
            return Err(StrategyError::InvalidConfig(format!(
                "strategy parameters must be an object, got {}",
                other
            )))
        }
    }
    for spec in specs {
        if let Some(value) = merged.get(&spec.name) {
            spec.check(value)?;
        }
    }
    Ok(Value::Object(merged))
}

/// Risk-based sizing with the stop `stop_pips` away from entry and the
/// target at `reward_ratio` times that distance.
pub fn risk_sizing(instrument: &Instrument, risk_percent: Decimal, stop_pips: Decimal, reward_ratio: Decimal) -> PositionSizing {
    PositionSizing::RiskBased {
        risk_percent,
        basis: BalanceBasis::Balance,
        stop_distance: instrument.pips_to_price(stop_pips),
        reward_ratio: (reward_ratio > Decimal::ZERO).then_some(reward_ratio),
    }
}

/// Specs shared by every built-in strategy.
pub(crate) fn risk_specs() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::decimal("risk_percent", "Percent of balance risked per trade", 1.0, 0.1, 5.0, 0.1),
        ParameterSpec::decimal("stop_pips", "Stop-loss distance in pips", 20.0, 1.0, 500.0, 5.0),
        ParameterSpec::decimal("reward_ratio", "Take-profit distance as a multiple of the stop (0 = none)", 2.0, 0.0, 10.0, 0.5),
    ]
}
