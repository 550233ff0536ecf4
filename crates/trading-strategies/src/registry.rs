//! Strategy registry for building strategies by name.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trading_core::{error::StrategyError, traits::Strategy};

use crate::params::{self, ParameterSpec};
use crate::{MaCrossoverParams, MaCrossoverStrategy, RsiParams, RsiStrategy};

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Registry key
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
    /// Default parameters as JSON
    pub default_params: Value,
}

type Factory = fn(Value) -> Result<Box<dyn Strategy>, StrategyError>;

struct Entry {
    info: StrategyInfo,
    factory: Factory,
}

/// The built-in strategies, in listing order.
pub struct StrategyRegistry {
    entries: Vec<Entry>,
}

fn decode<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, StrategyError> {
    serde_json::from_value(params).map_err(|e| StrategyError::InvalidConfig(e.to_string()))
}

impl StrategyRegistry {
    pub fn new() -> Self {
        let mut registry = Self { entries: Vec::new() };
        registry.register(
            "ma_crossover",
            "Trades fast/slow moving average crossovers",
            MaCrossoverParams::specs(),
            |p| Ok(Box::new(MaCrossoverStrategy::new(decode(p)?)?)),
        );
        registry.register(
            "rsi",
            "Trades RSI overbought/oversold reversals",
            RsiParams::specs(),
            |p| Ok(Box::new(RsiStrategy::new(decode(p)?)?)),
        );
        registry
    }

    fn register(&mut self, name: &str, description: &str, parameters: Vec<ParameterSpec>, factory: Factory) {
        let default_params = params::defaults(&parameters);
        self.entries.push(Entry {
            info: StrategyInfo {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
                default_params,
            },
            factory,
        });
    }

    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.entries.iter().map(|e| &e.info).collect()
    }

    pub fn get(&self, name: &str) -> Option<&StrategyInfo> {
        self.entry(name).map(|e| &e.info)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.info.name.as_str()).collect()
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.info.name == name)
    }

    /// Create a strategy from `params`, which may name only the values that
    /// differ from the defaults.
    pub fn create(&self, name: &str, params: &Value) -> Result<Box<dyn Strategy>, StrategyError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| StrategyError::NotFound(name.to_string()))?;
        let resolved = params::resolve(&entry.info.parameters, params)?;
        (entry.factory)(resolved)
    }

    pub fn create_default(&self, name: &str) -> Result<Box<dyn Strategy>, StrategyError> {
        self.create(name, &Value::Null)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_list() {
        let registry = StrategyRegistry::new();
        assert_eq!(registry.names(), vec!["ma_crossover", "rsi"]);
        assert!(registry.get("ma_crossover").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_create_default() {
        let registry = StrategyRegistry::new();
        let strategy = registry.create_default("ma_crossover").unwrap();
        assert_eq!(strategy.name(), "ma_crossover");
        assert_eq!(strategy.warmup_period(), 26);
    }

    #[test]
    fn test_create_with_partial_params() {
        let registry = StrategyRegistry::new();
        let strategy = registry
            .create("ma_crossover", &json!({"fast_period": 5, "slow_period": 10, "use_ema": false}))
            .unwrap();
        assert_eq!(strategy.warmup_period(), 10);

        let strategy = registry.create("rsi", &json!({"period": 7})).unwrap();
        assert_eq!(strategy.warmup_period(), 8);
    }

    #[test]
    fn test_create_rejects_bad_params() {
        let registry = StrategyRegistry::new();
        assert!(matches!(
            registry.create("ma_crossover", &json!({"fast_period": 30, "slow_period": 20})),
            Err(StrategyError::InvalidParameter { .. })
        ));
        assert!(matches!(
            registry.create("ma_crossover", &json!({"typo": 1})),
            Err(StrategyError::InvalidConfig(_))
        ));
        assert!(matches!(
            registry.create_default("unknown"),
            Err(StrategyError::NotFound(_))
        ));
    }
}
