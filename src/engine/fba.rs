// ============================================================================
// Frequent Batch Auction
// Silent order accumulation and uniform-price crossing on a fixed cadence
// ============================================================================

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use smallvec::{smallvec, SmallVec};

use crate::domain::{
    Decision, ExecutionReport, Order, OrderType, PriceLevel, Side, LOCAL_DESTINATION,
};

use super::market::{DisciplineState, MarketState};

impl MarketState {
    /// Submission-stage handling of one eligible order: nothing matches
    /// and nothing is broadcast until the next auction fires. Cancels
    /// still confirm immediately.
    pub(crate) fn process_submission(&mut self, mut order: Order) {
        match order.order_type {
            OrderType::LimitBuy | OrderType::MarketBuy => {
                self.insert_local(Side::Bid, order, false);
            },
            OrderType::LimitSell | OrderType::MarketSell => {
                self.insert_local(Side::Ask, order, false);
            },
            OrderType::CancelBid => self.cancel_local(Side::Bid, &mut order, false, true),
            OrderType::CancelAsk => self.cancel_local(Side::Ask, &mut order, false, true),
            // the reference feed plays no part in a batch-auction market
            OrderType::FeedTrade | OrderType::FeedBid | OrderType::FeedAsk => {},
        }
    }

    /// Run one batch auction: pick the uniform clearing price, publish it
    /// as an anonymous price update, then pair bid and ask quantity
    /// level by level with pro-rata allocation inside each level.
    pub(crate) fn run_auction(&mut self) {
        // resting market orders carry no price information, so the
        // crossing test looks past their sentinel levels
        let best_bid = self.priced_best_key(Side::Bid);
        let best_ask = self.priced_best_key(Side::Ask);
        let (Some(best_bid), Some(best_ask)) = (best_bid, best_ask) else {
            return;
        };
        if best_bid < best_ask {
            return;
        }

        // cumulative demand and supply per price level
        let mut table: BTreeMap<Decimal, (u32, u32)> = BTreeMap::new();
        let mut total_demand = 0u32;
        for level in self.books.local_bid.iter_best_to_worst() {
            total_demand += level.total_size();
            table.entry(level.price()).or_insert((0, 0)).0 = total_demand;
        }
        let mut total_supply = 0u32;
        for level in self.books.local_ask.iter_best_to_worst() {
            total_supply += level.total_size();
            table.entry(level.price()).or_insert((0, 0)).1 = total_supply;
        }

        // carry cumulative totals across prices present on only one side:
        // demand accumulates downward in price, supply upward
        let mut prev = 0u32;
        for entry in table.values_mut().rev() {
            if entry.0 == 0 {
                entry.0 = prev;
            } else {
                prev = entry.0;
            }
        }
        prev = 0;
        for entry in table.values_mut() {
            if entry.1 == 0 {
                entry.1 = prev;
            } else {
                prev = entry.1;
            }
        }

        let last = match &self.discipline {
            DisciplineState::FrequentBatch {
                last_clearing_price,
                ..
            } => *last_clearing_price,
            DisciplineState::Continuous => return,
        };

        let (total_execution, clearing_price) = select_clearing_price(&table, last);
        if let DisciplineState::FrequentBatch {
            last_clearing_price,
            ..
        } = &mut self.discipline
        {
            *last_clearing_price = clearing_price;
        }

        tracing::debug!(
            symbol = %self.symbol,
            %clearing_price,
            total_execution,
            "batch auction"
        );

        // subscribers only ever see the uniform price, never how many
        // trades it took to clear
        let report = ExecutionReport::price_update(
            &self.symbol,
            clearing_price,
            u32::try_from(total_execution).unwrap_or(0),
            LOCAL_DESTINATION,
            self.clock.timestamp(),
        );
        self.push_report(report);

        let Ok(mut remaining) = u32::try_from(total_execution) else {
            return;
        };

        // pair bid and ask allocations one level at a time
        let MarketState {
            books,
            reports,
            symbol,
            ..
        } = self;

        let mut bid_allocs: SmallVec<[u32; 16]> = SmallVec::new();
        let mut ask_allocs: SmallVec<[u32; 16]> = SmallVec::new();
        let (mut bid_alloc_idx, mut bid_order_idx) = (0usize, 0usize);
        let (mut ask_alloc_idx, mut ask_order_idx) = (0usize, 0usize);

        while remaining > 0 {
            let Some(bid_key) = books.local_bid.best_key() else {
                break;
            };
            let Some(ask_key) = books.local_ask.best_key() else {
                break;
            };

            if bid_alloc_idx >= bid_allocs.len() {
                let Some(level) = books.local_bid.level(bid_key) else {
                    break;
                };
                bid_allocs = determine_execution_sizes(remaining, level);
                bid_alloc_idx = 0;
                bid_order_idx = 0;
            }
            if ask_alloc_idx >= ask_allocs.len() {
                let Some(level) = books.local_ask.level(ask_key) else {
                    break;
                };
                ask_allocs = determine_execution_sizes(remaining, level);
                ask_alloc_idx = 0;
                ask_order_idx = 0;
            }

            while remaining > 0
                && bid_alloc_idx < bid_allocs.len()
                && ask_alloc_idx < ask_allocs.len()
            {
                let Some(bid_level) = books.local_bid.level_mut(bid_key) else {
                    break;
                };
                let Some(ask_level) = books.local_ask.level_mut(ask_key) else {
                    break;
                };

                let executed = bid_allocs[bid_alloc_idx].min(ask_allocs[ask_alloc_idx]);
                if executed > 0 {
                    if let (Some(bid_order), Some(ask_order)) = (
                        bid_level.order(bid_order_idx),
                        ask_level.order(ask_order_idx),
                    ) {
                        reports.push(ExecutionReport::matched(
                            symbol,
                            clearing_price,
                            executed,
                            bid_order,
                            ask_order,
                            Decision::Trade,
                        ));
                    }

                    bid_level.reduce(executed);
                    ask_level.reduce(executed);
                    if let Some(order) = bid_level.order_mut(bid_order_idx) {
                        order.size -= executed;
                    }
                    if let Some(order) = ask_level.order_mut(ask_order_idx) {
                        order.size -= executed;
                    }
                }

                bid_allocs[bid_alloc_idx] -= executed;
                ask_allocs[ask_alloc_idx] -= executed;
                remaining -= executed;

                if bid_allocs[bid_alloc_idx] == 0 {
                    bid_alloc_idx += 1;
                    if bid_level.order(bid_order_idx).is_some_and(|o| o.is_filled()) {
                        bid_level.remove_order(bid_order_idx);
                    } else {
                        bid_order_idx += 1;
                    }
                }
                if ask_allocs[ask_alloc_idx] == 0 {
                    ask_alloc_idx += 1;
                    if ask_level.order(ask_order_idx).is_some_and(|o| o.is_filled()) {
                        ask_level.remove_order(ask_order_idx);
                    } else {
                        ask_order_idx += 1;
                    }
                }
            }

            books.local_bid.remove_level_if_empty(bid_key);
            books.local_ask.remove_level_if_empty(ask_key);
        }
    }

    /// Best level key disregarding a hidden market-order sentinel level.
    fn priced_best_key(&self, side: Side) -> Option<Decimal> {
        let book = self.books.local(side);
        match book.best_key() {
            Some(key) if key == side.market_sentinel() => book.next_key_after(key),
            key => key,
        }
    }

    /// Every order that survives an auction gains one cycle of pro-rata
    /// seniority.
    pub(crate) fn increment_auction_counters(&mut self) {
        for book in [&mut self.books.local_bid, &mut self.books.local_ask] {
            for level in book.levels_mut() {
                for order in level.orders_mut() {
                    order.auction_counter += 1;
                }
            }
        }
    }
}

/// Apply the three clearing-price rules to the cumulative demand/supply
/// table, walking prices in ascending order:
///
/// 1. maximize the matched quantity `min(demand, supply)`;
/// 2. minimize the absolute unmatched excess `|demand - supply|`;
/// 3. prefer the price closest to the previous clearing price.
///
/// Returns the matched quantity (-1 when the table is empty) and the
/// chosen price.
pub(crate) fn select_clearing_price(
    table: &BTreeMap<Decimal, (u32, u32)>,
    last_clearing_price: Decimal,
) -> (i64, Decimal) {
    let mut total_execution: i64 = -1;
    let mut clearing_price = Decimal::ZERO;
    let mut min_excess: i64 = 0;

    // saturating arithmetic keeps sentinel-priced levels comparable
    let distance = |price: Decimal| price.saturating_sub(last_clearing_price).abs();

    for (&price, &(demand, supply)) in table {
        let matched = i64::from(demand.min(supply));
        let excess = (i64::from(demand) - i64::from(supply)).abs();

        if matched > total_execution {
            total_execution = matched;
            min_excess = excess;
            clearing_price = price;
        } else if matched == total_execution {
            if excess < min_excess {
                min_excess = excess;
                clearing_price = price;
            } else if excess == min_excess && distance(price) < distance(clearing_price) {
                clearing_price = price;
            }
        } else {
            break;
        }
    }

    (total_execution, clearing_price)
}

/// Split `total_execution` units across the orders of one level.
///
/// When the level cannot absorb the full quantity, allocation proceeds
/// one unit at a time within the most senior auction-counter tier before
/// moving to the next, so orders that survived more auctions fill first
/// and orders within a tier fill as evenly as their sizes allow. The
/// level must already be in seniority order.
pub(crate) fn determine_execution_sizes(
    total_execution: u32,
    level: &PriceLevel,
) -> SmallVec<[u32; 16]> {
    let mut sizes: SmallVec<[u32; 16]> = smallvec![0; level.order_count()];

    if total_execution >= level.total_size() {
        for (i, order) in level.orders().enumerate() {
            sizes[i] = order.size;
        }
        return sizes;
    }

    let mut counter = i64::from(level.front().map_or(0, |o| o.auction_counter));
    let mut remaining = total_execution;

    while remaining > 0 {
        let mut advanced = false;
        for (i, order) in level.orders().enumerate() {
            let order_counter = i64::from(order.auction_counter);
            if order_counter == counter && order.size > sizes[i] {
                sizes[i] += 1;
                advanced = true;
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            } else if order_counter < counter {
                // orders are sorted by seniority, nothing senior remains
                break;
            }
        }
        if !advanced {
            counter -= 1;
        }
    }

    sizes
}
