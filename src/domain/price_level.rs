// ============================================================================
// Price Level
// Orders resting at one price, with a cached aggregate size
// ============================================================================

use rust_decimal::Decimal;
use std::collections::VecDeque;

use super::Order;

/// All resting orders sharing one price, in arrival order (batch-auction
/// markets additionally re-sort by auction-counter seniority, see
/// [`PriceLevel::sort_for_auction`]).
///
/// The aggregate `size` is kept in sync on every insert, partial fill and
/// removal; an empty level must be removed from its book by the caller.
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    price: Decimal,
    size: u32,
    orders: VecDeque<Order>,
}

impl PriceLevel {
    /// Create a level holding a single order; the level takes the order's
    /// (possibly sentinel) price.
    pub fn new(order: Order) -> Self {
        Self {
            price: order.price,
            size: order.size,
            orders: VecDeque::from([order]),
        }
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn total_size(&self) -> u32 {
        self.size
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn push_back(&mut self, order: Order) {
        self.size += order.size;
        self.orders.push_back(order);
    }

    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    pub fn order(&self, idx: usize) -> Option<&Order> {
        self.orders.get(idx)
    }

    pub fn order_mut(&mut self, idx: usize) -> Option<&mut Order> {
        self.orders.get_mut(idx)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn orders_mut(&mut self) -> impl Iterator<Item = &mut Order> {
        self.orders.iter_mut()
    }

    /// Subtract an executed/cancelled quantity from the cached aggregate.
    /// The caller is responsible for the matching per-order reduction.
    pub fn reduce(&mut self, executed: u32) {
        debug_assert!(executed <= self.size, "level aggregate underflow");
        self.size -= executed;
    }

    pub fn remove_order(&mut self, idx: usize) -> Option<Order> {
        self.orders.remove(idx)
    }

    /// Position of the order with the given id, if present.
    pub fn position_of(&self, order_id: &str) -> Option<usize> {
        self.orders.iter().position(|o| o.order_id == order_id)
    }

    /// Batch-auction ordering: auction-counter seniority first, larger
    /// orders first within the same counter. Stable, so arrival order is
    /// preserved among equals.
    pub fn sort_for_auction(&mut self) {
        self.orders.make_contiguous().sort_by(|a, b| {
            b.auction_counter
                .cmp(&a.auction_counter)
                .then(b.size.cmp(&a.size))
        });
    }
}
