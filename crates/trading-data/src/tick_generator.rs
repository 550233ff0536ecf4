//! Synthetic intrabar ticks from OHLC bars.
//!
//! The mid price walks open → first extreme → second extreme → close. The
//! first extreme is the one nearer to the open, ties broken by the seeded
//! RNG. This is a modelling choice: it favours the smaller excursion first,
//! which is what most bars look like, but a bar does not record its real
//! path and strategies sensitive to intrabar order should use real ticks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::ops::ControlFlow;
use trading_core::types::numeric::round_to;
use trading_core::types::{Bar, Instrument, Tick};

/// Fewest ticks that can visit all four waypoints.
pub const MIN_TICKS: usize = 4;

/// How many ticks each bar expands into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TickDensity {
    /// The same count for every bar
    Fixed { ticks: usize },
    /// Scales with the bar's range in pips up to the reference range
    Range { min: usize, max: usize },
    /// One tick at the close; stops and targets are evaluated per bar
    BarOnly,
}

impl Default for TickDensity {
    fn default() -> Self {
        TickDensity::Fixed { ticks: 20 }
    }
}

/// Deterministic tick synthesis for backtests.
///
/// Every bar gets its own RNG seeded from the generator seed and the bar's
/// open time, so a bar always expands to the same ticks regardless of which
/// bars came before it.
#[derive(Debug, Clone)]
pub struct TickGenerator {
    spread: Decimal,
    density: TickDensity,
    seed: u64,
    price_precision: u32,
    pip_size: Decimal,
    reference_pips: Decimal,
    jitter_ratio: Decimal,
}

impl TickGenerator {
    /// `spread` is in price units.
    pub fn new(instrument: &Instrument, spread: Decimal, density: TickDensity, seed: u64) -> Self {
        Self {
            spread,
            density,
            seed,
            price_precision: instrument.price_precision,
            pip_size: instrument.pip_size,
            reference_pips: dec!(20),
            jitter_ratio: dec!(0.1),
        }
    }

    /// Bar range (in pips) at which `TickDensity::Range` reaches its maximum.
    pub fn with_reference_pips(mut self, pips: Decimal) -> Self {
        self.reference_pips = pips;
        self
    }

    /// Jitter amplitude as a fraction of the bar range.
    pub fn with_jitter(mut self, ratio: Decimal) -> Self {
        self.jitter_ratio = ratio.max(Decimal::ZERO);
        self
    }

    pub fn density(&self) -> TickDensity {
        self.density
    }

    pub fn spread(&self) -> Decimal {
        self.spread
    }

    pub fn is_bar_only(&self) -> bool {
        self.density == TickDensity::BarOnly
    }

    /// Number of ticks `bar` expands into.
    pub fn ticks_for(&self, bar: &Bar) -> usize {
        match self.density {
            TickDensity::BarOnly => 1,
            TickDensity::Fixed { ticks: n } => n.max(MIN_TICKS),
            TickDensity::Range { min, max } => {
                let min = min.max(MIN_TICKS);
                let max = max.max(min);
                if self.pip_size <= Decimal::ZERO || self.reference_pips <= Decimal::ZERO {
                    return min;
                }
                let ratio = (bar.range() / self.pip_size / self.reference_pips).min(Decimal::ONE);
                let extra = (Decimal::from((max - min) as u64) * ratio)
                    .floor()
                    .to_usize()
                    .unwrap_or(0);
                min + extra
            }
        }
    }

    /// Feed the ticks of `bar` to `on_tick` in order.
    ///
    /// `ControlFlow::Break(e)` aborts the remaining ticks of this bar and is
    /// returned as `Err(e)`. On success returns the number of ticks delivered.
    pub fn generate<E, F>(&self, bar: &Bar, mut on_tick: F) -> Result<usize, E>
    where
        F: FnMut(Tick) -> ControlFlow<E>,
    {
        let count = self.ticks_for(bar);
        if count == 1 {
            let tick = self.quote(bar, bar.close, 0, 0);
            return match on_tick(tick) {
                ControlFlow::Continue(()) => Ok(1),
                ControlFlow::Break(e) => Err(e),
            };
        }

        let mut rng = StdRng::seed_from_u64(self.seed_for(bar));
        let (first, second) = Self::extremes(bar, &mut rng);

        let last = count - 1;
        let p1 = (last / 3).max(1);
        let p2 = (2 * last / 3).max(p1 + 1).min(last - 1);
        let waypoints = [(0, bar.open), (p1, first), (p2, second), (last, bar.close)];
        let amplitude = bar.range() * self.jitter_ratio;

        for i in 0..count {
            let leg = if i <= p1 {
                0
            } else if i <= p2 {
                1
            } else {
                2
            };
            let (a_idx, a_val) = waypoints[leg];
            let (b_idx, b_val) = waypoints[leg + 1];

            let mid = if i == a_idx {
                a_val
            } else if i == b_idx {
                b_val
            } else {
                let frac = Decimal::from((i - a_idx) as u64) / Decimal::from((b_idx - a_idx) as u64);
                let base = a_val + (b_val - a_val) * frac;
                let jitter = amplitude * Decimal::new(rng.gen_range(-1000..=1000), 3);
                round_to(base + jitter, self.price_precision).clamp(bar.low, bar.high)
            };

            if let ControlFlow::Break(e) = on_tick(self.quote(bar, mid, i, last)) {
                return Err(e);
            }
        }

        Ok(count)
    }

    /// All ticks of `bar`, collected.
    pub fn ticks(&self, bar: &Bar) -> Vec<Tick> {
        let mut out = Vec::with_capacity(self.ticks_for(bar));
        let result = self.generate::<Infallible, _>(bar, |tick| {
            out.push(tick);
            ControlFlow::Continue(())
        });
        if let Err(never) = result {
            match never {}
        }
        out
    }

    fn seed_for(&self, bar: &Bar) -> u64 {
        self.seed ^ (bar.open_time.timestamp_millis() as u64)
    }

    fn extremes(bar: &Bar, rng: &mut StdRng) -> (Decimal, Decimal) {
        let to_high = bar.high - bar.open;
        let to_low = bar.open - bar.low;
        let high_first = match to_high.cmp(&to_low) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => rng.gen_bool(0.5),
        };
        if high_first {
            (bar.high, bar.low)
        } else {
            (bar.low, bar.high)
        }
    }

    /// Tick `index` of `last`, evenly spaced from open time to close time.
    fn quote(&self, bar: &Bar, mid: Decimal, index: usize, last: usize) -> Tick {
        let timestamp = if last == 0 {
            bar.close_time
        } else {
            let span = (bar.close_time - bar.open_time).num_milliseconds();
            bar.open_time + chrono::Duration::milliseconds(span * index as i64 / last as i64)
        };
        let half = self.spread / dec!(2);
        Tick {
            instrument: bar.instrument.clone(),
            bid: round_to(mid - half, self.price_precision),
            mid,
            ask: round_to(mid + half, self.price_precision),
            timestamp,
        }
    }
}
