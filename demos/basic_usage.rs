// ============================================================================
// Basic Usage Example
// ============================================================================

use exchange_engine::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

fn price(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn main() {
    println!("=== Exchange Engine Example ===\n");

    let (publisher, receivers) = ChannelPublisher::new();
    let clock = SimClock::manual();
    clock.advance_ms(10);

    let market = Market::continuous("AAPL", clock, Arc::new(publisher));
    println!("Created continuous market for AAPL\n");

    // Add sell orders at different prices
    println!("Adding sell orders...");
    for i in 0i64..5 {
        market.buffer_local_order(Order::local(
            "AAPL",
            format!("seller_{}", i),
            format!("s{}", i),
            OrderType::LimitSell,
            price(10_000 + i * 5),
            100,
            0,
            chrono::Utc::now(),
        ));
        market.poll();
    }

    // Add buy orders, the last one marketable
    println!("Adding buy orders...");
    for i in 0i64..5 {
        market.buffer_local_order(Order::local(
            "AAPL",
            format!("buyer_{}", i),
            format!("b{}", i),
            OrderType::LimitBuy,
            price(9_990 - i * 5),
            100,
            0,
            chrono::Utc::now(),
        ));
        market.poll();
    }

    market.buffer_local_order(Order::local(
        "AAPL",
        "taker",
        "t1",
        OrderType::LimitBuy,
        price(10_005),
        150,
        0,
        chrono::Utc::now(),
    ));
    market.poll();

    println!("\n=== Execution Reports ===");
    while let Ok(report) = receivers.reports.try_recv() {
        println!(
            "  {:?}: {} @ {} ({} <- {})",
            report.decision, report.size, report.price, report.trader_id_1, report.trader_id_2
        );
    }

    println!("\n=== Book Updates ===");
    while let Ok(update) = receivers.updates.try_recv() {
        println!(
            "  {:?}: {} @ {}",
            update.record, update.size, update.price
        );
    }

    // Full snapshot for a cold subscriber
    market.publish_snapshot("demo-session");
    println!("\n=== Snapshot ===");
    while let Ok((target, book)) = receivers.snapshots.try_recv() {
        println!("  target {}: {} entries", target, book.len());
    }
}
