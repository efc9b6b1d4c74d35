// ============================================================================
// Exchange Engine Library
// Simulated securities-exchange matching core with pluggable market disciplines
// ============================================================================

//! # Exchange Engine
//!
//! A per-symbol matching core for a simulated securities exchange.
//!
//! ## Features
//!
//! - **Continuous markets** with price-time priority, a full-depth local
//!   book and a top-of-book global book fed by an external reference feed
//! - **Frequent batch auctions** that accumulate orders silently and
//!   cross at a uniform clearing price on a fixed simulated-time cadence
//! - **Simulation clock** with a configurable speed multiplier and a
//!   manually driven source for deterministic tests
//! - **One worker per symbol**: books are fully independent, so there is
//!   no cross-symbol locking at all
//!
//! ## Example
//!
//! ```rust
//! use exchange_engine::prelude::*;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! let clock = SimClock::manual();
//! clock.advance_ms(10);
//! let market = Market::continuous("AAPL", clock, Arc::new(NoOpPublisher));
//!
//! let order = Order::local(
//!     "AAPL",
//!     "trader1",
//!     "order1",
//!     OrderType::LimitBuy,
//!     Decimal::new(10000, 2), // 100.00
//!     100,
//!     0,
//!     chrono::Utc::now(),
//! );
//! market.buffer_local_order(order);
//! assert!(market.poll());
//! ```

pub mod clock;
pub mod domain;
pub mod engine;
pub mod interfaces;

// Re-exports for convenience
pub mod prelude {
    pub use crate::clock::SimClock;
    pub use crate::domain::{
        BookRecord, BookUpdate, Decision, ExecutionReport, Order, OrderType, Side,
        FEED_DESTINATION, LOCAL_DESTINATION,
    };
    pub use crate::engine::{
        run_market, spawn_market, Discipline, Market, MarketError, MarketParam, MarketRegistry,
    };
    pub use crate::interfaces::{
        ChannelPublisher, LoggingPublisher, MarketPublisher, NoOpPublisher,
    };
}
