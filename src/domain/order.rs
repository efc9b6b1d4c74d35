// ============================================================================
// Order Domain Model
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Order type as carried on the wire.
///
/// The first six variants are client actions; the `Feed*` variants are
/// reference-feed records (an external trade print and external best
/// bid/ask quotes) injected by the data-feed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OrderType {
    LimitBuy,
    LimitSell,
    MarketBuy,
    MarketSell,
    CancelBid,
    CancelAsk,
    FeedTrade,
    FeedBid,
    FeedAsk,
}

impl OrderType {
    /// Wire code used by the protocol-session layer.
    pub fn as_char(self) -> char {
        match self {
            OrderType::LimitBuy => '1',
            OrderType::LimitSell => '2',
            OrderType::MarketBuy => '3',
            OrderType::MarketSell => '4',
            OrderType::CancelBid => '5',
            OrderType::CancelAsk => '6',
            OrderType::FeedTrade => '7',
            OrderType::FeedBid => '8',
            OrderType::FeedAsk => '9',
        }
    }

    pub fn is_market(self) -> bool {
        matches!(self, OrderType::MarketBuy | OrderType::MarketSell)
    }

    pub fn is_feed(self) -> bool {
        matches!(
            self,
            OrderType::FeedTrade | OrderType::FeedBid | OrderType::FeedAsk
        )
    }
}

/// Destination tag carried by locally matched executions.
pub const LOCAL_DESTINATION: &str = "LOCAL";

/// Destination tag carried by reference-feed trade prints.
pub const FEED_DESTINATION: &str = "FEED";

/// One order flowing through a market: either a client action (new order
/// or cancel) or a reference-feed record.
///
/// `arrival_ms` is the order's logical arrival instant expressed as a
/// simulated-time offset in milliseconds; it decides when the order
/// becomes eligible for matching and how the two inbound queues are
/// merged back into one chronological stream. `timestamp` is the
/// protocol-level timestamp kept for execution reports.
///
/// `auction_counter` is only meaningful in batch-auction markets: it
/// counts the auction cycles the order has survived unmatched and
/// determines its pro-rata seniority.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Order {
    pub symbol: String,
    pub trader_id: String,
    pub order_id: String,
    pub order_type: OrderType,
    pub price: Decimal,
    pub size: u32,
    pub destination: String,
    pub arrival_ms: i64,
    pub timestamp: DateTime<Utc>,
    pub auction_counter: u32,
}

impl Order {
    /// Build a client order (new order or cancel request).
    #[allow(clippy::too_many_arguments)]
    pub fn local(
        symbol: impl Into<String>,
        trader_id: impl Into<String>,
        order_id: impl Into<String>,
        order_type: OrderType,
        price: Decimal,
        size: u32,
        arrival_ms: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            trader_id: trader_id.into(),
            order_id: order_id.into(),
            order_type,
            price,
            size,
            destination: LOCAL_DESTINATION.to_string(),
            arrival_ms,
            timestamp,
            auction_counter: 0,
        }
    }

    /// Build a reference-feed record (trade print or top-of-book quote)
    /// originating from an external destination.
    pub fn feed(
        symbol: impl Into<String>,
        order_type: OrderType,
        price: Decimal,
        size: u32,
        destination: impl Into<String>,
        arrival_ms: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            trader_id: String::new(),
            order_id: String::new(),
            order_type,
            price,
            size,
            destination: destination.into(),
            arrival_ms,
            timestamp,
            auction_counter: 0,
        }
    }

    /// Repeated feed quotes of the same kind with the same price, size
    /// and destination carry no new information and are skipped by the
    /// matching loop.
    pub fn same_feed_tick(&self, other: &Order) -> bool {
        self.order_type == other.order_type
            && self.price == other.price
            && self.size == other.size
            && self.destination == other.destination
    }

    pub fn is_filled(&self) -> bool {
        self.size == 0
    }
}
