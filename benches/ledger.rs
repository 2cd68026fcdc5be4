//! Hot-path benchmarks: book refresh, history record and ledger rebalance.

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pedlar::{InstrumentKey, OrderBook, PortfolioLedger, PriceHistory, Quote, TargetHoldings};

fn universe(n: usize) -> Vec<InstrumentKey> {
    (0..n)
        .map(|i| InstrumentKey::new(if i % 2 == 0 { "TrueFX" } else { "IEX" }, &format!("S{i:03}")))
        .collect()
}

/// Synthetic snapshots drifting with a deterministic xorshift32.
fn generate_ticks(keys: &[InstrumentKey], n_ticks: usize) -> Vec<Vec<Quote>> {
    let mut mids = vec![100.0f64; keys.len()];
    let mut rng_state: u32 = 42;

    (0..n_ticks)
        .map(|tick| {
            let time = Utc.timestamp_opt(1_700_000_000 + tick as i64, 0).unwrap();
            keys.iter()
                .zip(mids.iter_mut())
                .map(|(key, mid)| {
                    rng_state ^= rng_state << 13;
                    rng_state ^= rng_state >> 17;
                    rng_state ^= rng_state << 5;
                    let ret = ((rng_state % 401) as f64 - 200.0) / 10_000.0;
                    *mid = (*mid * (1.0 + ret)).max(1.0);
                    Quote::new(time, key, *mid - 0.01, *mid + 0.01)
                })
                .collect()
        })
        .collect()
}

fn bench_history_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("history/record");

    for n_keys in [12, 100] {
        let keys = universe(n_keys);
        let ticks = generate_ticks(&keys, 2_000);

        group.bench_with_input(BenchmarkId::from_parameter(n_keys), &ticks, |b, ticks| {
            b.iter(|| {
                let mut history = PriceHistory::new(1_000);
                for tick in ticks {
                    history.record(black_box(tick));
                }
                black_box(history.len())
            })
        });
    }

    group.finish();
}

fn bench_rebalance(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/rebalance");

    for n_keys in [12, 100] {
        let keys = universe(n_keys);
        let ticks = generate_ticks(&keys, 250);
        let books: Vec<OrderBook> = ticks
            .iter()
            .map(|tick| {
                let mut book = OrderBook::new();
                book.refresh(tick);
                book
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(n_keys), &books, |b, books| {
            b.iter(|| {
                let mut ledger = PortfolioLedger::new(keys.clone(), 1_000_000.0, 2.0);
                for (i, book) in books.iter().enumerate() {
                    ledger.mark_to_market(book);
                    ledger.update_capital_limit();
                    let volume = if i % 2 == 0 { 10 } else { -10 };
                    let target = TargetHoldings::uniform(&keys, volume);
                    let _ = black_box(ledger.rebalance(&target, book, book.as_of().unwrap_or_default()));
                }
                black_box(ledger.cash())
            })
        });
    }

    group.finish();
}

fn bench_book_refresh(c: &mut Criterion) {
    let keys = universe(100);
    let ticks = generate_ticks(&keys, 100);

    c.bench_function("book/refresh_100", |b| {
        let mut book = OrderBook::new();
        b.iter(|| {
            for tick in &ticks {
                book.refresh(black_box(tick));
            }
            black_box(book.len())
        })
    });
}

criterion_group!(benches, bench_history_record, bench_rebalance, bench_book_refresh);
criterion_main!(benches);
