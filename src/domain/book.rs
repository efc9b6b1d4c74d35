// ============================================================================
// Order Books
// Local (full-depth) and global (top-of-book per destination) books
// ============================================================================

use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};

use super::{Order, OrderType, PriceLevel};

/// Book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Sentinel price that guarantees a resting market order sorts ahead
    /// of every real price level on this side. Sentinels are never
    /// broadcast and never used as an execution price.
    pub fn market_sentinel(self) -> Decimal {
        match self {
            Side::Bid => Decimal::MAX,
            Side::Ask => Decimal::MIN,
        }
    }

    /// `true` if `a` is a strictly better price than `b` on this side.
    pub fn is_better(self, a: Decimal, b: Decimal) -> bool {
        match self {
            Side::Bid => a > b,
            Side::Ask => a < b,
        }
    }
}

// ============================================================================
// Local Book
// ============================================================================

/// Full-depth resting client orders for one side of one symbol, organized
/// into price levels.
///
/// Levels live in an ordered map keyed by price; matching code re-resolves
/// the best/next key on every step instead of holding cursors across
/// mutations, so erasing a level can never invalidate a walk in progress.
#[derive(Debug)]
pub struct LocalBook {
    side: Side,
    levels: BTreeMap<Decimal, PriceLevel>,
}

impl LocalBook {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Insert an order at its price level, creating the level on first
    /// use. Market orders are stored under the side's sentinel price so
    /// they always sort to the front of the book. Returns the level key.
    pub fn insert(&mut self, mut order: Order) -> Decimal {
        if order.order_type.is_market() {
            order.price = self.side.market_sentinel();
        }
        let key = order.price;
        match self.levels.get_mut(&key) {
            Some(level) => level.push_back(order),
            None => {
                self.levels.insert(key, PriceLevel::new(order));
            },
        }
        key
    }

    /// Best (front-of-book) level key: highest bid, lowest ask. A resting
    /// market order's sentinel level always comes first.
    pub fn best_key(&self) -> Option<Decimal> {
        match self.side {
            Side::Bid => self.levels.keys().next_back().copied(),
            Side::Ask => self.levels.keys().next().copied(),
        }
    }

    /// The key of the level immediately worse than `key` in best-to-worst
    /// walk order.
    pub fn next_key_after(&self, key: Decimal) -> Option<Decimal> {
        use std::ops::Bound::{Excluded, Unbounded};
        match self.side {
            Side::Bid => self
                .levels
                .range((Unbounded, Excluded(key)))
                .next_back()
                .map(|(k, _)| *k),
            Side::Ask => self
                .levels
                .range((Excluded(key), Unbounded))
                .next()
                .map(|(k, _)| *k),
        }
    }

    pub fn level(&self, key: Decimal) -> Option<&PriceLevel> {
        self.levels.get(&key)
    }

    pub fn level_mut(&mut self, key: Decimal) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&key)
    }

    pub fn remove_level(&mut self, key: Decimal) -> Option<PriceLevel> {
        self.levels.remove(&key)
    }

    /// Drop the level at `key` if it no longer holds any orders.
    pub fn remove_level_if_empty(&mut self, key: Decimal) {
        if self.levels.get(&key).is_some_and(|l| l.is_empty()) {
            self.levels.remove(&key);
        }
    }

    pub fn iter_best_to_worst(&self) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match self.side {
            Side::Bid => Box::new(self.levels.values().rev()),
            Side::Ask => Box::new(self.levels.values()),
        }
    }

    pub fn iter_worst_to_best(&self) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match self.side {
            Side::Bid => Box::new(self.levels.values()),
            Side::Ask => Box::new(self.levels.values().rev()),
        }
    }

    pub fn levels_mut(&mut self) -> impl Iterator<Item = &mut PriceLevel> {
        self.levels.values_mut()
    }

    /// Exact-price level lookup used by cancel requests; a cancel with a
    /// non-positive price targets a resting market order, which lives in
    /// the front (sentinel) level.
    pub fn cancel_target_key(&self, price: Decimal) -> Option<Decimal> {
        if price > Decimal::ZERO {
            self.levels.get(&price).map(|l| l.price())
        } else {
            self.best_key()
        }
    }
}

// ============================================================================
// Global Book
// ============================================================================

/// Top-of-book reference prices for one side of one symbol: at most one
/// entry per external destination, ordered best to worst.
///
/// Entries are not resting orders; each new feed quote *replaces* the
/// standing quote for its destination. Because the feed only ever supplies
/// top-of-book, a new quote also invalidates any standing entries at a
/// better price than itself: those quotes are stale and are evicted.
#[derive(Debug)]
pub struct GlobalBook {
    side: Side,
    entries: VecDeque<Order>,
}

impl GlobalBook {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            entries: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn best(&self) -> Option<&Order> {
        self.entries.front()
    }

    pub fn best_mut(&mut self) -> Option<&mut Order> {
        self.entries.front_mut()
    }

    pub fn pop_best(&mut self) -> Option<Order> {
        self.entries.pop_front()
    }

    pub fn iter_best_to_worst(&self) -> impl Iterator<Item = &Order> {
        self.entries.iter()
    }

    pub fn iter_worst_to_best(&self) -> impl Iterator<Item = &Order> {
        self.entries.iter().rev()
    }

    /// Fold a new top-of-book quote into the book: evict stale
    /// better-priced entries, update the size in place on an exact
    /// price/destination match, otherwise insert in price order.
    pub fn apply_quote(&mut self, quote: Order) {
        let mut i = 0;
        while i < self.entries.len() {
            let current = self.entries[i].price;
            if self.side.is_better(current, quote.price) {
                self.entries.remove(i);
            } else if current == quote.price {
                if self.entries[i].destination == quote.destination {
                    self.entries[i].size = quote.size;
                    return;
                }
                i += 1;
            } else {
                self.entries.insert(i, quote);
                return;
            }
        }
        self.entries.push_back(quote);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn bid(id: &str, price: Decimal, size: u32) -> Order {
        Order::local("AAPL", "t1", id, OrderType::LimitBuy, price, size, 0, Utc::now())
    }

    fn quote(price: Decimal, size: u32, dest: &str) -> Order {
        Order::feed("AAPL", OrderType::FeedBid, price, size, dest, 0, Utc::now())
    }

    #[test]
    fn test_local_book_best_and_next_keys() {
        let mut book = LocalBook::new(Side::Bid);
        book.insert(bid("a", dec!(99.98), 100));
        book.insert(bid("b", dec!(100.00), 100));
        book.insert(bid("c", dec!(99.99), 100));

        assert_eq!(book.best_key(), Some(dec!(100.00)));
        assert_eq!(book.next_key_after(dec!(100.00)), Some(dec!(99.99)));
        assert_eq!(book.next_key_after(dec!(99.98)), None);
    }

    #[test]
    fn test_market_order_takes_sentinel_level() {
        let mut book = LocalBook::new(Side::Bid);
        book.insert(bid("a", dec!(100.00), 100));

        let mut market = bid("m", dec!(0.00), 50);
        market.order_type = OrderType::MarketBuy;
        let key = book.insert(market);

        assert_eq!(key, Decimal::MAX);
        assert_eq!(book.best_key(), Some(Decimal::MAX));
        assert_eq!(book.next_key_after(Decimal::MAX), Some(dec!(100.00)));
    }

    #[test]
    fn test_cancel_target_key() {
        let mut book = LocalBook::new(Side::Ask);
        let mut ask = bid("a", dec!(101.00), 100);
        ask.order_type = OrderType::LimitSell;
        book.insert(ask);

        assert_eq!(book.cancel_target_key(dec!(101.00)), Some(dec!(101.00)));
        assert_eq!(book.cancel_target_key(dec!(102.00)), None);
        // a non-positive cancel price targets the front of the book
        assert_eq!(book.cancel_target_key(Decimal::ZERO), Some(dec!(101.00)));
    }

    #[test]
    fn test_global_book_replaces_same_destination() {
        let mut book = GlobalBook::new(Side::Bid);
        book.apply_quote(quote(dec!(100.00), 300, "NYSE"));
        book.apply_quote(quote(dec!(100.00), 450, "NYSE"));

        assert_eq!(book.depth(), 1);
        assert_eq!(book.best().unwrap().size, 450);
    }

    #[test]
    fn test_global_book_keeps_price_order_across_destinations() {
        let mut book = GlobalBook::new(Side::Bid);
        book.apply_quote(quote(dec!(99.98), 100, "ARCA"));
        book.apply_quote(quote(dec!(99.99), 150, "BATS"));
        book.apply_quote(quote(dec!(100.00), 200, "NYSE"));

        let prices: Vec<Decimal> = book.iter_best_to_worst().map(|o| o.price).collect();
        assert_eq!(prices, vec![dec!(100.00), dec!(99.99), dec!(99.98)]);
    }

    #[test]
    fn test_global_book_evicts_stale_better_quotes() {
        let mut book = GlobalBook::new(Side::Bid);
        book.apply_quote(quote(dec!(100.02), 100, "NYSE"));
        book.apply_quote(quote(dec!(100.01), 100, "BATS"));

        // a lower top-of-book bid means the older, better-priced quotes
        // are no longer live
        book.apply_quote(quote(dec!(100.00), 100, "ARCA"));

        assert_eq!(book.depth(), 1);
        assert_eq!(book.best().unwrap().price, dec!(100.00));
        assert_eq!(book.best().unwrap().destination, "ARCA");
    }
}
