// ============================================================================
// Execution Reports and Order Book Records
// Outbound records handed to the publication layer
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{Order, OrderType};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What an execution report represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Decision {
    /// Two orders matched.
    Trade,
    /// A resting order was (partially) cancelled; execution price is 0.
    Cancel,
    /// A price update with no disclosed counterparties: an external trade
    /// print, or a batch auction's uniform clearing price.
    PriceUpdate,
}

impl Decision {
    /// Wire code used by the protocol-session layer.
    pub fn as_char(self) -> char {
        match self {
            Decision::Trade => '2',
            Decision::Cancel => '4',
            Decision::PriceUpdate => '5',
        }
    }
}

/// One execution record: a match, a cancel confirmation, or a price
/// update. Party 1 is the resting/book side, party 2 the incoming side.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExecutionReport {
    pub id: Uuid,
    pub symbol: String,
    pub price: Decimal,
    pub size: u32,
    pub trader_id_1: String,
    pub trader_id_2: String,
    pub order_type_1: OrderType,
    pub order_type_2: OrderType,
    pub order_id_1: String,
    pub order_id_2: String,
    pub decision: Decision,
    pub destination: String,
    pub time_1: DateTime<Utc>,
    pub time_2: DateTime<Utc>,
}

impl ExecutionReport {
    /// Report for an execution between a book-side order (resting or
    /// global entry) and an incoming order.
    pub fn matched(
        symbol: &str,
        price: Decimal,
        size: u32,
        book_order: &Order,
        incoming: &Order,
        decision: Decision,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            price,
            size,
            trader_id_1: book_order.trader_id.clone(),
            trader_id_2: incoming.trader_id.clone(),
            order_type_1: book_order.order_type,
            order_type_2: incoming.order_type,
            order_id_1: book_order.order_id.clone(),
            order_id_2: incoming.order_id.clone(),
            decision,
            destination: book_order.destination.clone(),
            time_1: book_order.timestamp,
            time_2: incoming.timestamp,
        }
    }

    /// Anonymous price update (external trade print or auction clearing
    /// price); counterparty fields carry fixed placeholders.
    pub fn price_update(
        symbol: &str,
        price: Decimal,
        size: u32,
        destination: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            price,
            size,
            trader_id_1: "T1".to_string(),
            trader_id_2: "T2".to_string(),
            order_type_1: OrderType::LimitBuy,
            order_type_2: OrderType::LimitSell,
            order_id_1: "O1".to_string(),
            order_id_2: "O2".to_string(),
            decision: Decision::PriceUpdate,
            destination: destination.to_string(),
            time_1: now,
            time_2: now,
        }
    }
}

/// Which of the four per-symbol books a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BookRecord {
    GlobalBid,
    GlobalAsk,
    LocalBid,
    LocalAsk,
}

impl BookRecord {
    /// Wire code used by the protocol-session layer.
    pub fn as_char(self) -> char {
        match self {
            BookRecord::GlobalBid => 'B',
            BookRecord::GlobalAsk => 'A',
            BookRecord::LocalBid => 'b',
            BookRecord::LocalAsk => 'a',
        }
    }
}

/// One order-book record: a delta broadcast after a level's size changed,
/// or one line of a full snapshot.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BookUpdate {
    pub record: BookRecord,
    pub symbol: String,
    pub price: Decimal,
    pub size: u32,
    /// Originating destination for global records; empty for local ones.
    pub destination: String,
    pub timestamp: DateTime<Utc>,
}

impl BookUpdate {
    pub fn local(
        record: BookRecord,
        symbol: &str,
        price: Decimal,
        size: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            record,
            symbol: symbol.to_string(),
            price,
            size,
            destination: String::new(),
            timestamp,
        }
    }

    pub fn global(
        record: BookRecord,
        symbol: &str,
        price: Decimal,
        size: u32,
        destination: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            record,
            symbol: symbol.to_string(),
            price,
            size,
            destination: destination.to_string(),
            timestamp,
        }
    }

    /// Leading snapshot entry (price 0, size 0) that tells a cold
    /// subscriber to clear its copy of the book before applying the rest.
    pub fn clear_marker(record: BookRecord, symbol: &str, timestamp: DateTime<Utc>) -> Self {
        Self::local(record, symbol, Decimal::ZERO, 0, timestamp)
    }
}
