//! Benchmarks for intrabar tick synthesis.

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal_macros::dec;
use std::ops::ControlFlow;
use trading_core::types::{Bar, Instrument, Timeframe};
use trading_data::{TickDensity, TickGenerator};

fn sample_bar() -> Bar {
    Bar::new(
        "EUR_USD",
        Timeframe::Hour1,
        Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
        dec!(1.10000),
        dec!(1.10450),
        dec!(1.09870),
        dec!(1.10210),
        dec!(1500),
    )
}

fn benchmark_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("TickGenerator");
    let bar = sample_bar();
    let instrument = Instrument::forex("EUR_USD");

    for ticks in [4usize, 60, 600].iter() {
        let generator = TickGenerator::new(&instrument, dec!(0.00015), TickDensity::Fixed { ticks: *ticks }, 42);

        group.bench_with_input(BenchmarkId::new("callback", ticks), &bar, |b, bar| {
            b.iter(|| {
                generator.generate::<(), _>(black_box(bar), |tick| {
                    black_box(tick);
                    ControlFlow::Continue(())
                })
            })
        });

        group.bench_with_input(BenchmarkId::new("collect", ticks), &bar, |b, bar| {
            b.iter(|| generator.ticks(black_box(bar)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_generate);
criterion_main!(benches);
