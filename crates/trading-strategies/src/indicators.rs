//! Decimal technical indicators used by the built-in strategies.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// A batch indicator over a price series, oldest value first.
pub trait Indicator {
    /// Output values, one per full window; empty when there is not enough data.
    fn calculate(&self, data: &[Decimal]) -> Vec<Decimal>;

    /// Number of input values needed for the first output.
    fn period(&self) -> usize;

    fn name(&self) -> &str;

    /// Most recent output value, if any.
    fn latest(&self, data: &[Decimal]) -> Option<Decimal> {
        self.calculate(data).last().copied()
    }
}

/// Simple Moving Average.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// A zero period is treated as one.
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }
}

impl Indicator for Sma {
    fn calculate(&self, data: &[Decimal]) -> Vec<Decimal> {
        if data.len() < self.period {
            return vec![];
        }

        let period = Decimal::from(self.period);
        let mut result = Vec::with_capacity(data.len() - self.period + 1);
        let mut sum: Decimal = data[..self.period].iter().sum();
        result.push(sum / period);

        for i in self.period..data.len() {
            sum = sum - data[i - self.period] + data[i];
            result.push(sum / period);
        }
        result
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "SMA"
    }
}

/// Exponential Moving Average seeded with the SMA of the first window.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: Decimal,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            multiplier: dec!(2) / Decimal::from(period + 1),
        }
    }
}

impl Indicator for Ema {
    fn calculate(&self, data: &[Decimal]) -> Vec<Decimal> {
        if data.len() < self.period {
            return vec![];
        }

        let mut result = Vec::with_capacity(data.len() - self.period + 1);
        let mut ema = data[..self.period].iter().sum::<Decimal>() / Decimal::from(self.period);
        result.push(ema);

        let keep = Decimal::ONE - self.multiplier;
        for &price in &data[self.period..] {
            ema = price * self.multiplier + ema * keep;
            result.push(ema);
        }
        result
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "EMA"
    }
}

/// Relative Strength Index with Wilder smoothing.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    fn wilder_smooth(values: &[Decimal], period: usize) -> Vec<Decimal> {
        if values.len() < period {
            return vec![];
        }

        let n = Decimal::from(period);
        let mut result = Vec::with_capacity(values.len() - period + 1);
        let mut avg = values[..period].iter().sum::<Decimal>() / n;
        result.push(avg);

        for &value in &values[period..] {
            avg = (avg * (n - Decimal::ONE) + value) / n;
            result.push(avg);
        }
        result
    }
}

impl Indicator for Rsi {
    fn calculate(&self, data: &[Decimal]) -> Vec<Decimal> {
        if data.len() <= self.period {
            return vec![];
        }

        let (gains, losses): (Vec<Decimal>, Vec<Decimal>) = data
            .windows(2)
            .map(|w| {
                let change = w[1] - w[0];
                if change > Decimal::ZERO {
                    (change, Decimal::ZERO)
                } else {
                    (Decimal::ZERO, -change)
                }
            })
            .unzip();

        let avg_gains = Self::wilder_smooth(&gains, self.period);
        let avg_losses = Self::wilder_smooth(&losses, self.period);

        avg_gains
            .iter()
            .zip(avg_losses.iter())
            .map(|(&gain, &loss)| {
                if loss.is_zero() {
                    dec!(100)
                } else {
                    dec!(100) - dec!(100) / (Decimal::ONE + gain / loss)
                }
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "RSI"
    }
}
