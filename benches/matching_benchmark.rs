// ============================================================================
// Exchange Engine Benchmarks
// ============================================================================
//
// Benchmark Categories:
// 1. Continuous Matching - End-to-end order flow through a continuous market
// 2. Batch Auctions - Auction crossing cost at varying book depths
// 3. Book Operations - Insert, cancel and snapshot costs
// ============================================================================

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use exchange_engine::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

fn price(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn local(trader: &str, id: &str, order_type: OrderType, price: Decimal, size: u32) -> Order {
    Order::local("BENCH", trader, id, order_type, price, size, 0, chrono::Utc::now())
}

fn continuous_market() -> Market {
    let clock = SimClock::manual();
    clock.advance_ms(10);
    Market::continuous("BENCH", clock, Arc::new(NoOpPublisher))
}

// ============================================================================
// Continuous Matching Benchmarks
// ============================================================================

fn benchmark_continuous_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("continuous_matching");

    // resting depth the incoming order has to walk
    for depth in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("sweep_levels", depth),
            depth,
            |b, &depth| {
                b.iter_batched(
                    || {
                        let market = continuous_market();
                        for i in 0..depth {
                            market.buffer_local_order(local(
                                "makers",
                                &format!("s{i}"),
                                OrderType::LimitSell,
                                price(10_000 + i as i64),
                                10,
                            ));
                            market.poll();
                        }
                        market
                    },
                    |market| {
                        market.buffer_local_order(local(
                            "taker",
                            "b1",
                            OrderType::LimitBuy,
                            price(10_000 + depth as i64),
                            10 * depth,
                        ));
                        black_box(market.poll());
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.bench_function("insert_no_match", |b| {
        b.iter_batched(
            continuous_market,
            |market| {
                market.buffer_local_order(local(
                    "maker",
                    "b1",
                    OrderType::LimitBuy,
                    price(9_900),
                    100,
                ));
                black_box(market.poll());
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

// ============================================================================
// Batch Auction Benchmarks
// ============================================================================

fn benchmark_batch_auction(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_auction");

    for orders_per_side in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("cross", orders_per_side),
            orders_per_side,
            |b, &n| {
                b.iter_batched(
                    || {
                        let clock = SimClock::manual();
                        clock.advance_ms(1);
                        let market =
                            Market::frequent_batch("BENCH", 1.0, clock.clone(), Arc::new(NoOpPublisher));
                        for i in 0..n {
                            market.buffer_local_order(local(
                                "buyers",
                                &format!("b{i}"),
                                OrderType::LimitBuy,
                                price(10_000 + (i % 10) as i64),
                                50,
                            ));
                            market.poll();
                            market.buffer_local_order(local(
                                "sellers",
                                &format!("s{i}"),
                                OrderType::LimitSell,
                                price(9_995 + (i % 10) as i64),
                                50,
                            ));
                            market.poll();
                        }
                        clock.set_elapsed_ms(1_001);
                        market
                    },
                    |market| {
                        black_box(market.poll());
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

// ============================================================================
// Book Operation Benchmarks
// ============================================================================

fn benchmark_book_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("book_operations");

    group.bench_function("snapshot_100_levels", |b| {
        let market = continuous_market();
        for i in 0..100 {
            market.buffer_local_order(local(
                "makers",
                &format!("b{i}"),
                OrderType::LimitBuy,
                price(9_000 + i as i64),
                100,
            ));
            market.poll();
        }
        b.iter(|| market.publish_snapshot(black_box("bench")));
    });

    group.bench_function("cancel_in_deep_level", |b| {
        b.iter_batched(
            || {
                let market = continuous_market();
                for i in 0..100 {
                    market.buffer_local_order(local(
                        "makers",
                        &format!("b{i}"),
                        OrderType::LimitBuy,
                        price(9_900),
                        100,
                    ));
                    market.poll();
                }
                market
            },
            |market| {
                market.buffer_local_order(local(
                    "makers",
                    "b99",
                    OrderType::CancelBid,
                    price(9_900),
                    100,
                ));
                black_box(market.poll());
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_continuous_matching,
    benchmark_batch_auction,
    benchmark_book_operations
);
criterion_main!(benches);
