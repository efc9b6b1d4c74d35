// ============================================================================
// Continuous Matching
// Immediate price-time-priority execution against the local and global books
// ============================================================================

use rust_decimal::Decimal;

use crate::domain::{Decision, Order, OrderType, Side};

use super::market::MarketState;

impl MarketState {
    /// Continuous-discipline handling of one eligible order.
    pub(crate) fn process_continuous(&mut self, mut order: Order) {
        match order.order_type {
            OrderType::LimitBuy => {
                // executes as a market order, so fills report the taker
                // side as marketable
                order.order_type = OrderType::MarketBuy;
                self.match_incoming(&mut order, Side::Ask, true);
                order.order_type = OrderType::LimitBuy;
                if order.size > 0 {
                    self.insert_local(Side::Bid, order, true);
                }
            },
            OrderType::LimitSell => {
                order.order_type = OrderType::MarketSell;
                self.match_incoming(&mut order, Side::Bid, true);
                order.order_type = OrderType::LimitSell;
                if order.size > 0 {
                    self.insert_local(Side::Ask, order, true);
                }
            },
            OrderType::MarketBuy => {
                self.match_incoming(&mut order, Side::Ask, false);
                if order.size > 0 {
                    self.insert_local(Side::Bid, order, true);
                }
            },
            OrderType::MarketSell => {
                self.match_incoming(&mut order, Side::Bid, false);
                if order.size > 0 {
                    self.insert_local(Side::Ask, order, true);
                }
            },
            OrderType::CancelBid => self.cancel_local(Side::Bid, &mut order, true, false),
            OrderType::CancelAsk => self.cancel_local(Side::Ask, &mut order, true, false),
            OrderType::FeedTrade => {
                // an external print consumes any local interest it
                // crosses; whatever remains is reported as an anonymous
                // price update
                self.cross_feed(&mut order, Side::Ask);
                self.cross_feed(&mut order, Side::Bid);
                if order.size > 0 {
                    self.report_feed_trade(order.price, order.size);
                }
            },
            OrderType::FeedBid => {
                if self.is_repeated_feed_tick(&order) {
                    return;
                }
                self.cross_feed(&mut order, Side::Ask);
                if order.size > 0 {
                    self.apply_feed_quote(Side::Bid, order);
                }
            },
            OrderType::FeedAsk => {
                if self.is_repeated_feed_tick(&order) {
                    return;
                }
                self.cross_feed(&mut order, Side::Bid);
                if order.size > 0 {
                    self.apply_feed_quote(Side::Ask, order);
                }
            },
        }
    }

    fn is_repeated_feed_tick(&mut self, order: &Order) -> bool {
        if self
            .prev_feed_quote
            .as_ref()
            .is_some_and(|prev| prev.same_feed_tick(order))
        {
            return true;
        }
        self.prev_feed_quote = Some(order.clone());
        false
    }

    /// Match an incoming client order against the books on `book_side`
    /// (the ask books for a buy, the bid books for a sell) until it is
    /// filled, its limit price stops it, or liquidity runs out.
    ///
    /// The walk keeps only a level key and an order index as its
    /// position and re-resolves both through the ordered map on every
    /// step, so removing an exhausted level never invalidates it.
    fn match_incoming(&mut self, incoming: &mut Order, book_side: Side, is_limit: bool) {
        let mut cur_key = self.books.local(book_side).best_key();
        let mut idx = 0usize;
        // set once a resting market order is the only local liquidity
        // left and the incoming order is also a market order
        let mut local_exhausted = false;

        while incoming.size > 0 {
            // resolve the local candidate: level key, execution price,
            // and whether its consumption is broadcast
            let mut local: Option<(Decimal, Decimal, bool)> = None;
            if !local_exhausted {
                if let Some(key) = cur_key {
                    let book = self.books.local(book_side);
                    let level = match book.level(key) {
                        Some(level) if idx < level.order_count() => level,
                        _ => {
                            cur_key = book.next_key_after(key);
                            idx = 0;
                            continue;
                        },
                    };
                    let Some(book_order) = level.order(idx) else {
                        idx += 1;
                        continue;
                    };

                    if book_order.trader_id == incoming.trader_id {
                        // wash-trade guard: never match a trader with
                        // their own resting order
                        idx += 1;
                        continue;
                    }

                    if book_order.order_type.is_market() {
                        // a resting market order has no price of its
                        // own; it trades at the next level's price when
                        // one exists, else at the incoming limit price
                        let next = book.next_key_after(key);
                        if is_limit {
                            let price = match next {
                                Some(next_key)
                                    if book_side.is_better(next_key, incoming.price) =>
                                {
                                    next_key
                                },
                                _ => incoming.price,
                            };
                            local = Some((key, price, false));
                        } else {
                            match next {
                                Some(next_key) => local = Some((key, next_key, false)),
                                None => {
                                    // market against market with no
                                    // price reference: skip the local
                                    // book entirely
                                    local_exhausted = true;
                                    continue;
                                },
                            }
                        }
                    } else {
                        local = Some((key, book_order.price, true));
                    }
                }
            }

            let global_price = self.books.global(book_side).best().map(|o| o.price);
            let local_price = local.map(|(_, price, _)| price);

            let best = match (local_price, global_price) {
                (Some(l), Some(g)) => {
                    if book_side.is_better(g, l) {
                        g
                    } else {
                        l
                    }
                },
                (Some(l), None) => l,
                (None, Some(g)) => g,
                (None, None) => break,
            };

            // a limit order stops once its own price beats every
            // remaining candidate
            if is_limit && book_side.is_better(incoming.price, best) {
                break;
            }

            let use_local = match (local_price, global_price) {
                // a tie executes locally
                (Some(l), Some(g)) => !book_side.is_better(g, l),
                (Some(_), None) => true,
                _ => false,
            };

            if use_local {
                let Some((key, price, update)) = local else {
                    break;
                };
                self.execute_local(book_side, key, idx, incoming, price, Decision::Trade);

                if update {
                    if let Some(level) = self.books.local(book_side).level(key) {
                        let (level_price, level_size) = (level.price(), level.total_size());
                        self.push_local_update(book_side, level_price, level_size);
                    }
                }

                let book = self.books.local_mut(book_side);
                if book.level(key).is_some_and(|level| level.is_empty()) {
                    book.remove_level(key);
                    cur_key = book.next_key_after(key);
                    idx = 0;
                }
            } else if let Some(global_best) = global_price {
                self.execute_global(book_side, incoming, global_best, Decision::Trade);
            }
        }
    }

    /// Cross a reference-feed record (a print or a new best quote)
    /// against the local book on `book_side`, consuming every resting
    /// order the feed price reaches. Each level trades at one price,
    /// computed once at the front of the level.
    fn cross_feed(&mut self, feed: &mut Order, book_side: Side) {
        while feed.size > 0 {
            let book = self.books.local(book_side);
            let Some(key) = book.best_key() else {
                break;
            };
            // stop once the feed price no longer reaches the level
            if book_side.is_better(feed.price, key) {
                break;
            }

            let (price, update) = match book.level(key).and_then(|level| level.front()) {
                Some(front) if front.order_type.is_market() => {
                    let price = match book.next_key_after(key) {
                        Some(next_key) if book_side.is_better(next_key, feed.price) => next_key,
                        _ => feed.price,
                    };
                    (price, false)
                },
                Some(front) => (front.price, true),
                None => break,
            };

            let mut idx = 0usize;
            while feed.size > 0 {
                let count = self
                    .books
                    .local(book_side)
                    .level(key)
                    .map_or(0, |level| level.order_count());
                if idx >= count {
                    break;
                }
                let removed = self.execute_local(book_side, key, idx, feed, price, Decision::Trade);
                if !removed {
                    idx += 1;
                }
            }

            if update {
                if let Some(level) = self.books.local(book_side).level(key) {
                    let (level_price, level_size) = (level.price(), level.total_size());
                    self.push_local_update(book_side, level_price, level_size);
                }
            }

            self.books.local_mut(book_side).remove_level_if_empty(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal_macros::dec;

    use crate::clock::SimClock;
    use crate::domain::{BookRecord, Decision, Order, OrderType, FEED_DESTINATION};
    use crate::engine::Market;
    use crate::interfaces::{ChannelPublisher, PublisherReceivers};

    fn market() -> (Market, PublisherReceivers) {
        let (publisher, receivers) = ChannelPublisher::new();
        let clock = SimClock::manual();
        clock.advance_ms(1_000);
        (Market::continuous("AAPL", clock, Arc::new(publisher)), receivers)
    }

    fn order(trader: &str, id: &str, order_type: OrderType, price: &str, size: u32) -> Order {
        Order::local(
            "AAPL",
            trader,
            id,
            order_type,
            price.parse().unwrap(),
            size,
            0,
            Utc::now(),
        )
    }

    fn run(market: &Market, orders: Vec<Order>) {
        for o in orders {
            market.buffer_local_order(o);
            assert!(market.poll());
        }
    }

    #[test]
    fn test_incoming_buy_executes_at_resting_price() {
        let (market, receivers) = market();
        run(
            &market,
            vec![
                order("maker", "s1", OrderType::LimitSell, "99.50", 200),
                order("taker", "b1", OrderType::LimitBuy, "100.00", 300),
            ],
        );

        let report = receivers.reports.recv().unwrap();
        assert_eq!(report.decision, Decision::Trade);
        assert_eq!(report.price, dec!(99.50));
        assert_eq!(report.size, 200);
        assert_eq!(report.trader_id_1, "maker");
        assert_eq!(report.trader_id_2, "taker");

        // the 100-share remainder rests at its own limit price
        let books = market.with_state(|s| s.snapshot(false, usize::MAX));
        let local_bids = &books[0];
        assert_eq!(local_bids.len(), 2);
        assert_eq!(local_bids[1].price, dec!(100.00));
        assert_eq!(local_bids[1].size, 100);
    }

    #[test]
    fn test_price_time_priority_across_levels() {
        let (market, receivers) = market();
        run(
            &market,
            vec![
                order("m1", "s1", OrderType::LimitSell, "100.02", 100),
                order("m2", "s2", OrderType::LimitSell, "100.01", 100),
                order("m3", "s3", OrderType::LimitSell, "100.01", 100),
                order("taker", "b1", OrderType::LimitBuy, "100.02", 250),
            ],
        );

        // better price first, then arrival order within the level
        let fills: Vec<(String, u32)> = (0..3)
            .map(|_| {
                let r = receivers.reports.recv().unwrap();
                (r.trader_id_1.clone(), r.size)
            })
            .collect();
        assert_eq!(fills[0], ("m2".to_string(), 100));
        assert_eq!(fills[1], ("m3".to_string(), 100));
        assert_eq!(fills[2], ("m1".to_string(), 50));
    }

    #[test]
    fn test_taker_reports_as_marketable() {
        let (market, receivers) = market();
        run(
            &market,
            vec![
                order("maker", "s1", OrderType::LimitSell, "100.00", 100),
                order("taker", "b1", OrderType::LimitBuy, "100.00", 100),
            ],
        );

        let report = receivers.reports.recv().unwrap();
        assert_eq!(report.order_type_1, OrderType::LimitSell);
        assert_eq!(report.order_type_2, OrderType::MarketBuy);
    }

    #[test]
    fn test_self_trade_skipped() {
        let (market, receivers) = market();
        run(
            &market,
            vec![
                order("alice", "s1", OrderType::LimitSell, "100.00", 100),
                order("bob", "s2", OrderType::LimitSell, "100.00", 100),
                order("alice", "b1", OrderType::LimitBuy, "100.00", 100),
            ],
        );

        // alice's buy must skip her own resting ask and hit bob's
        let report = receivers.reports.recv().unwrap();
        assert_eq!(report.trader_id_1, "bob");
        assert_eq!(report.size, 100);
    }

    #[test]
    fn test_resting_market_order_prices_off_next_level() {
        let (market, receivers) = market();
        run(
            &market,
            vec![
                order("m1", "ms1", OrderType::MarketSell, "0.00", 100),
                order("m2", "s1", OrderType::LimitSell, "99.80", 100),
                order("taker", "b1", OrderType::LimitBuy, "100.00", 100),
            ],
        );

        // the resting market sell trades at the next level's price
        // because it is better than the taker's limit
        let report = receivers.reports.recv().unwrap();
        assert_eq!(report.trader_id_1, "m1");
        assert_eq!(report.price, dec!(99.80));
    }

    #[test]
    fn test_sentinel_level_never_broadcast() {
        let (market, receivers) = market();
        run(
            &market,
            vec![order("m1", "ms1", OrderType::MarketSell, "0.00", 100)],
        );

        assert!(receivers.updates.try_recv().is_err());
    }

    #[test]
    fn test_cancel_reduces_and_confirms_at_price_zero() {
        let (market, receivers) = market();
        run(
            &market,
            vec![
                order("maker", "s1", OrderType::LimitSell, "100.00", 300),
                order("maker", "s1", OrderType::CancelAsk, "100.00", 100),
            ],
        );

        let report = receivers.reports.recv().unwrap();
        assert_eq!(report.decision, Decision::Cancel);
        assert_eq!(report.price, dec!(0.00));
        assert_eq!(report.size, 100);

        let books = market.with_state(|s| s.snapshot(false, usize::MAX));
        let local_asks = &books[1];
        assert_eq!(local_asks[1].size, 200);
    }

    #[test]
    fn test_cancel_unknown_order_is_a_no_op() {
        let (market, receivers) = market();
        run(
            &market,
            vec![
                order("maker", "s1", OrderType::LimitSell, "100.00", 300),
                order("maker", "zz", OrderType::CancelAsk, "100.00", 100),
                order("maker", "s1", OrderType::CancelAsk, "101.00", 100),
            ],
        );

        // neither the unknown id nor the wrong price produced a report
        assert!(receivers.reports.try_recv().is_err());
        let books = market.with_state(|s| s.snapshot(false, usize::MAX));
        assert_eq!(books[1][1].size, 300);
    }

    #[test]
    fn test_global_quote_beats_worse_local_price() {
        let (market, receivers) = market();
        market.buffer_feed_order(Order::feed(
            "AAPL",
            OrderType::FeedAsk,
            dec!(99.90),
            500,
            "NYSE",
            0,
            Utc::now(),
        ));
        assert!(market.poll());
        run(
            &market,
            vec![
                order("maker", "s1", OrderType::LimitSell, "100.00", 100),
                order("taker", "b1", OrderType::LimitBuy, "100.00", 200),
            ],
        );

        // first fill comes from the better-priced external quote
        let _ask_quote_update = receivers.updates.recv().unwrap();
        let first = receivers.reports.recv().unwrap();
        assert_eq!(first.price, dec!(99.90));
        assert_eq!(first.size, 200);
        assert_eq!(first.destination, "NYSE");
    }

    #[test]
    fn test_local_book_wins_price_tie_with_global() {
        let (market, receivers) = market();
        market.buffer_feed_order(Order::feed(
            "AAPL",
            OrderType::FeedAsk,
            dec!(100.00),
            500,
            "NYSE",
            0,
            Utc::now(),
        ));
        assert!(market.poll());
        run(
            &market,
            vec![
                order("maker", "s1", OrderType::LimitSell, "100.00", 100),
                order("taker", "b1", OrderType::LimitBuy, "100.00", 100),
            ],
        );

        let _quote_update = receivers.updates.recv().unwrap();
        let _insert_update = receivers.updates.recv().unwrap();
        let report = receivers.reports.recv().unwrap();
        assert_eq!(report.trader_id_1, "maker");
        assert_eq!(report.destination, "LOCAL");
    }

    #[test]
    fn test_feed_trade_crosses_then_reports_remainder() {
        let (market, receivers) = market();
        run(
            &market,
            vec![order("maker", "s1", OrderType::LimitSell, "99.95", 100)],
        );
        market.buffer_feed_order(Order::feed(
            "AAPL",
            OrderType::FeedTrade,
            dec!(100.00),
            300,
            "NYSE",
            0,
            Utc::now(),
        ));
        assert!(market.poll());

        let fill = receivers.reports.recv().unwrap();
        assert_eq!(fill.decision, Decision::Trade);
        assert_eq!(fill.size, 100);
        assert_eq!(fill.price, dec!(99.95));

        let remainder = receivers.reports.recv().unwrap();
        assert_eq!(remainder.decision, Decision::PriceUpdate);
        assert_eq!(remainder.size, 200);
        assert_eq!(remainder.destination, FEED_DESTINATION);
    }

    #[test]
    fn test_repeated_feed_quote_is_skipped() {
        let (market, receivers) = market();
        for _ in 0..2 {
            market.buffer_feed_order(Order::feed(
                "AAPL",
                OrderType::FeedBid,
                dec!(99.00),
                500,
                "NYSE",
                0,
                Utc::now(),
            ));
            assert!(market.poll());
        }

        // only the first tick produced a global book update
        assert_eq!(receivers.updates.recv().unwrap().record, BookRecord::GlobalBid);
        assert!(receivers.updates.try_recv().is_err());
    }

    #[test]
    fn test_feed_quote_crosses_resting_local_interest() {
        let (market, receivers) = market();
        run(
            &market,
            vec![order("maker", "s1", OrderType::LimitSell, "99.50", 200)],
        );
        market.buffer_feed_order(Order::feed(
            "AAPL",
            OrderType::FeedBid,
            dec!(99.50),
            300,
            "NYSE",
            0,
            Utc::now(),
        ));
        assert!(market.poll());

        let fill = receivers.reports.recv().unwrap();
        assert_eq!(fill.size, 200);
        assert_eq!(fill.price, dec!(99.50));

        // the 100-share remainder becomes the standing global bid
        let state_books = market.with_state(|s| s.snapshot(true, usize::MAX));
        let global_bids = &state_books[0];
        assert_eq!(global_bids.len(), 2);
        assert_eq!(global_bids[1].size, 100);
        assert_eq!(global_bids[1].destination, "NYSE");
        drop(receivers);
    }
}
