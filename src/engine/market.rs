// ============================================================================
// Market Core
// Per-symbol order queues, book set and shared matching primitives
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::clock::SimClock;
use crate::domain::{
    BookRecord, BookUpdate, Decision, ExecutionReport, GlobalBook, LocalBook, Order, Side,
    FEED_DESTINATION,
};
use crate::interfaces::MarketPublisher;

/// Post-auction snapshot depth for batch-auction markets: only the best
/// levels are disclosed between auctions.
pub(crate) const FBA_SNAPSHOT_DEPTH: usize = 5;

/// Matching discipline of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Incoming orders match immediately against the resting books.
    Continuous,
    /// Orders accumulate silently and cross at a uniform price on a
    /// fixed simulated-time cadence.
    FrequentBatch,
}

/// Discipline plus the mutable scheduling state it carries.
#[derive(Debug)]
pub(crate) enum DisciplineState {
    Continuous,
    FrequentBatch {
        interval_ms: i64,
        next_auction_ms: i64,
        /// Uniform price of the previous auction; starts at zero, which
        /// biases the very first auction's tie-break toward lower prices.
        last_clearing_price: Decimal,
    },
}

// ============================================================================
// Book Set
// ============================================================================

/// The four per-symbol books. Kept as separate fields so bid and ask
/// sides can be borrowed mutably at the same time during auction pairing.
pub(crate) struct BookSet {
    pub global_bid: GlobalBook,
    pub global_ask: GlobalBook,
    pub local_bid: LocalBook,
    pub local_ask: LocalBook,
}

impl BookSet {
    fn new() -> Self {
        Self {
            global_bid: GlobalBook::new(Side::Bid),
            global_ask: GlobalBook::new(Side::Ask),
            local_bid: LocalBook::new(Side::Bid),
            local_ask: LocalBook::new(Side::Ask),
        }
    }

    pub fn local(&self, side: Side) -> &LocalBook {
        match side {
            Side::Bid => &self.local_bid,
            Side::Ask => &self.local_ask,
        }
    }

    pub fn local_mut(&mut self, side: Side) -> &mut LocalBook {
        match side {
            Side::Bid => &mut self.local_bid,
            Side::Ask => &mut self.local_ask,
        }
    }

    pub fn global(&self, side: Side) -> &GlobalBook {
        match side {
            Side::Bid => &self.global_bid,
            Side::Ask => &self.global_ask,
        }
    }

    pub fn global_mut(&mut self, side: Side) -> &mut GlobalBook {
        match side {
            Side::Bid => &mut self.global_bid,
            Side::Ask => &mut self.global_ask,
        }
    }
}

pub(crate) fn local_record(side: Side) -> BookRecord {
    match side {
        Side::Bid => BookRecord::LocalBid,
        Side::Ask => BookRecord::LocalAsk,
    }
}

pub(crate) fn global_record(side: Side) -> BookRecord {
    match side {
        Side::Bid => BookRecord::GlobalBid,
        Side::Ask => BookRecord::GlobalAsk,
    }
}

// ============================================================================
// Market State
// ============================================================================

/// Everything guarded by the per-symbol book lock: the four books, the
/// outbound record buffers, and the discipline's scheduling state.
///
/// All mutations happen under one lock held for the duration of a single
/// matching step, so a snapshot can never observe a half-updated book.
/// Buffered reports and updates are drained and published only after the
/// lock is released.
pub(crate) struct MarketState {
    pub symbol: String,
    pub clock: SimClock,
    pub books: BookSet,
    pub reports: Vec<ExecutionReport>,
    pub updates: Vec<BookUpdate>,
    /// Last reference-feed quote seen; repeated identical ticks carry no
    /// information and are skipped.
    pub prev_feed_quote: Option<Order>,
    pub discipline: DisciplineState,
}

impl MarketState {
    fn new(symbol: String, clock: SimClock, discipline: DisciplineState) -> Self {
        Self {
            symbol,
            clock,
            books: BookSet::new(),
            reports: Vec::new(),
            updates: Vec::new(),
            prev_feed_quote: None,
            discipline,
        }
    }

    pub fn push_report(&mut self, report: ExecutionReport) {
        self.reports.push(report);
    }

    pub fn push_local_update(&mut self, side: Side, price: Decimal, size: u32) {
        let update = BookUpdate::local(
            local_record(side),
            &self.symbol,
            price,
            size,
            self.clock.timestamp(),
        );
        self.updates.push(update);
    }

    pub fn push_global_update(&mut self, side: Side, price: Decimal, size: u32, destination: &str) {
        let update = BookUpdate::global(
            global_record(side),
            &self.symbol,
            price,
            size,
            destination,
            self.clock.timestamp(),
        );
        self.updates.push(update);
    }

    /// Dispatch one eligible order according to the market's discipline.
    pub fn handle_order(&mut self, order: Order) {
        match self.discipline {
            DisciplineState::Continuous => self.process_continuous(order),
            DisciplineState::FrequentBatch { .. } => self.process_submission(order),
        }
    }

    /// If the batch-auction deadline has passed, advance it and report
    /// that an auction is due. Continuous markets are never due.
    pub fn auction_due(&mut self, now_ms: i64) -> bool {
        match &mut self.discipline {
            DisciplineState::FrequentBatch {
                interval_ms,
                next_auction_ms,
                ..
            } if now_ms >= *next_auction_ms => {
                *next_auction_ms += *interval_ms;
                true
            },
            _ => false,
        }
    }

    // ------------------------------------------------------------------------
    // Shared book operations
    // ------------------------------------------------------------------------

    /// Rest an order in its local book. Market orders take the side's
    /// sentinel level and are never broadcast; batch-auction markets
    /// additionally keep every level in pro-rata seniority order.
    pub fn insert_local(&mut self, side: Side, order: Order, broadcast: bool) {
        let hidden = order.order_type.is_market();
        let sort = matches!(self.discipline, DisciplineState::FrequentBatch { .. });

        let book = self.books.local_mut(side);
        let key = book.insert(order);
        let (price, size) = match book.level_mut(key) {
            Some(level) => {
                if sort {
                    level.sort_for_auction();
                }
                (level.price(), level.total_size())
            },
            None => return,
        };

        if broadcast && !hidden {
            self.push_local_update(side, price, size);
        }
    }

    /// Execute the book order at (`key`, `idx`) against `incoming` for
    /// `min(book, incoming)` units at `price`, emit the report, and
    /// remove the book order if it is now filled. Returns whether the
    /// book order was removed. The caller drops the level if it empties.
    pub fn execute_local(
        &mut self,
        side: Side,
        key: Decimal,
        idx: usize,
        incoming: &mut Order,
        price: Decimal,
        decision: Decision,
    ) -> bool {
        let symbol = self.symbol.clone();
        let Some(level) = self.books.local_mut(side).level_mut(key) else {
            return false;
        };
        let Some(book_order) = level.order(idx) else {
            return false;
        };

        let book_size = book_order.size;
        let executed = book_size.min(incoming.size);
        let report = ExecutionReport::matched(&symbol, price, executed, book_order, incoming, decision);

        level.reduce(executed);
        if let Some(book_order) = level.order_mut(idx) {
            book_order.size = book_size - executed;
        }
        incoming.size -= executed;

        let removed = book_size == executed;
        if removed {
            level.remove_order(idx);
        }

        self.push_report(report);
        removed
    }

    /// Execute the best entry of a global book against `incoming` at
    /// `price`, emit the report, broadcast the entry's remaining size
    /// (zero when fully consumed) and drop it when exhausted.
    pub fn execute_global(
        &mut self,
        side: Side,
        incoming: &mut Order,
        price: Decimal,
        decision: Decision,
    ) {
        let symbol = self.symbol.clone();
        let Some(entry) = self.books.global_mut(side).best_mut() else {
            tracing::warn!(symbol = %symbol, ?side, "global book empty during match");
            return;
        };

        let entry_size = entry.size;
        let executed = entry_size.min(incoming.size);
        let report = ExecutionReport::matched(&symbol, price, executed, entry, incoming, decision);

        entry.size = entry_size - executed;
        incoming.size -= executed;

        let (entry_price, entry_size, destination) =
            (entry.price, entry.size, entry.destination.clone());
        self.push_report(report);
        self.push_global_update(side, entry_price, entry_size, &destination);

        if entry_size == 0 {
            self.books.global_mut(side).pop_best();
        }
    }

    /// Cancel up to `cancel.size` units of the resting order with the
    /// matching id. A non-positive cancel price targets a resting market
    /// order at the front of the book. Cancels always confirm with an
    /// execution price of zero.
    pub fn cancel_local(&mut self, side: Side, cancel: &mut Order, broadcast: bool, resort: bool) {
        let book = self.books.local(side);
        let target = book
            .cancel_target_key(cancel.price)
            .and_then(|key| book.level(key).map(|level| (key, level.position_of(&cancel.order_id))));

        let (key, idx) = match target {
            Some((key, Some(idx))) => (key, idx),
            _ => {
                tracing::info!(symbol = %self.symbol, order_id = %cancel.order_id, "no matching order to cancel");
                return;
            },
        };

        let was_market = self
            .books
            .local(side)
            .level(key)
            .and_then(|level| level.order(idx))
            .is_some_and(|o| o.order_type.is_market());

        self.execute_local(side, key, idx, cancel, Decimal::ZERO, Decision::Cancel);

        let level_info = self
            .books
            .local(side)
            .level(key)
            .map(|level| (level.price(), level.total_size()));

        if broadcast && !was_market {
            if let Some((price, size)) = level_info {
                self.push_local_update(side, price, size);
            }
        }

        let book = self.books.local_mut(side);
        book.remove_level_if_empty(key);
        if resort {
            if let Some(level) = book.level_mut(key) {
                level.sort_for_auction();
            }
        }
    }

    /// Fold a reference-feed top-of-book quote into the global book and
    /// broadcast it.
    pub fn apply_feed_quote(&mut self, side: Side, quote: Order) {
        self.push_global_update(side, quote.price, quote.size, &quote.destination);
        self.books.global_mut(side).apply_quote(quote);
    }

    /// Report for the unmatched remainder of an external trade print.
    pub fn report_feed_trade(&mut self, price: Decimal, size: u32) {
        let report = ExecutionReport::price_update(
            &self.symbol,
            price,
            size,
            FEED_DESTINATION,
            self.clock.timestamp(),
        );
        self.push_report(report);
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    /// Serialize the current books for a cold subscriber: one vector per
    /// book, each led by a zero-price/zero-size clear marker followed by
    /// entries from worst to best price, so the subscriber can replay
    /// them with its ordinary delta procedure.
    ///
    /// `max_levels` keeps only the entries within that many levels of
    /// the front of the book; hidden sentinel levels still count against
    /// the limit even though they are never emitted.
    pub fn snapshot(&self, include_global: bool, max_levels: usize) -> Vec<Vec<BookUpdate>> {
        let now = self.clock.timestamp();
        let mut books = Vec::with_capacity(4);

        if include_global {
            for side in [Side::Bid, Side::Ask] {
                let record = global_record(side);
                let global = self.books.global(side);
                let mut entries = vec![BookUpdate::clear_marker(record, &self.symbol, now)];
                let mut rank = global.depth();
                for order in global.iter_worst_to_best() {
                    rank -= 1;
                    if rank < max_levels {
                        entries.push(BookUpdate::global(
                            record,
                            &self.symbol,
                            order.price,
                            order.size,
                            &order.destination,
                            now,
                        ));
                    }
                }
                books.push(entries);
            }
        }

        for side in [Side::Bid, Side::Ask] {
            let record = local_record(side);
            let local = self.books.local(side);
            let mut entries = vec![BookUpdate::clear_marker(record, &self.symbol, now)];
            let mut rank = local.depth();
            for level in local.iter_worst_to_best() {
                rank -= 1;
                let hidden = level.front().is_some_and(|o| o.order_type.is_market());
                if rank < max_levels && !hidden {
                    entries.push(BookUpdate::local(
                        record,
                        &self.symbol,
                        level.price(),
                        level.total_size(),
                        now,
                    ));
                }
            }
            books.push(entries);
        }

        books
    }
}

// ============================================================================
// Market
// ============================================================================

/// One simulated per-symbol market: two inbound order queues, the book
/// state, and the publisher the outbound records are handed to.
///
/// A market is driven by repeatedly calling [`Market::poll`] from a
/// dedicated worker thread; client and feed sessions only ever touch the
/// short-lived queue locks.
pub struct Market {
    symbol: String,
    clock: SimClock,
    publisher: Arc<dyn MarketPublisher>,
    feed_queue: Mutex<VecDeque<Order>>,
    local_queue: Mutex<VecDeque<Order>>,
    state: Mutex<MarketState>,
}

impl std::fmt::Debug for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Market")
            .field("symbol", &self.symbol)
            .finish_non_exhaustive()
    }
}

impl Market {
    /// Continuous price-time-priority market.
    pub fn continuous(
        symbol: impl Into<String>,
        clock: SimClock,
        publisher: Arc<dyn MarketPublisher>,
    ) -> Self {
        Self::with_discipline(symbol.into(), clock, publisher, DisciplineState::Continuous)
    }

    /// Frequent-batch-auction market crossing every `batch_interval_s`
    /// simulated seconds.
    pub fn frequent_batch(
        symbol: impl Into<String>,
        batch_interval_s: f64,
        clock: SimClock,
        publisher: Arc<dyn MarketPublisher>,
    ) -> Self {
        let interval_ms = (batch_interval_s * 1_000.0) as i64;
        Self::with_discipline(
            symbol.into(),
            clock,
            publisher,
            DisciplineState::FrequentBatch {
                interval_ms,
                next_auction_ms: interval_ms,
                last_clearing_price: Decimal::ZERO,
            },
        )
    }

    fn with_discipline(
        symbol: String,
        clock: SimClock,
        publisher: Arc<dyn MarketPublisher>,
        discipline: DisciplineState,
    ) -> Self {
        Self {
            state: Mutex::new(MarketState::new(symbol.clone(), clock.clone(), discipline)),
            symbol,
            clock,
            publisher,
            feed_queue: Mutex::new(VecDeque::new()),
            local_queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn discipline(&self) -> Discipline {
        match self.state.lock().discipline {
            DisciplineState::Continuous => Discipline::Continuous,
            DisciplineState::FrequentBatch { .. } => Discipline::FrequentBatch,
        }
    }

    /// Enqueue a client order (new order or cancel).
    pub fn buffer_local_order(&self, order: Order) {
        self.local_queue.lock().push_back(order);
    }

    /// Enqueue a reference-feed record.
    pub fn buffer_feed_order(&self, order: Order) {
        self.feed_queue.lock().push_back(order);
    }

    /// Merge the two inbound queues back into one chronological stream:
    /// take whichever front order arrived first, but only once its
    /// arrival instant has passed on the simulation clock. A client
    /// order wins an arrival-time tie against a feed record.
    fn next_eligible_order(&self) -> Option<Order> {
        let now_ms = self.clock.sim_elapsed_ms();

        let mut feed_queue = self.feed_queue.lock();
        let mut local_queue = self.local_queue.lock();

        let feed_ms = feed_queue.front().map(|o| o.arrival_ms);
        let feed_ready = feed_ms.is_some_and(|ms| ms < now_ms);

        if let Some(local) = local_queue.front() {
            if feed_ready {
                if feed_ms >= Some(local.arrival_ms) {
                    return local_queue.pop_front();
                }
                return feed_queue.pop_front();
            }
            if local.arrival_ms < now_ms {
                return local_queue.pop_front();
            }
            return None;
        }

        if feed_ready {
            return feed_queue.pop_front();
        }
        None
    }

    /// One step of the market's matching loop: run a due batch auction,
    /// or process the next eligible order. Returns `false` when there
    /// was nothing to do and the caller should back off briefly.
    ///
    /// Buffered reports and book records are published after the book
    /// lock is released, so the publisher can never block matching.
    pub fn poll(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.auction_due(self.clock.sim_elapsed_ms()) {
                state.run_auction();
                state.increment_auction_counters();

                let reports = std::mem::take(&mut state.reports);
                let updates = std::mem::take(&mut state.updates);
                let books = state.snapshot(false, FBA_SNAPSHOT_DEPTH);
                drop(state);

                self.flush(reports, updates);
                for book in &books {
                    self.publisher.publish_book_snapshot("", book);
                }
                return true;
            }
        }

        let Some(order) = self.next_eligible_order() else {
            return false;
        };

        let mut state = self.state.lock();
        state.handle_order(order);
        let reports = std::mem::take(&mut state.reports);
        let updates = std::mem::take(&mut state.updates);
        drop(state);

        self.flush(reports, updates);
        true
    }

    /// Serialize the full book set for one cold subscriber (empty target
    /// means every subscriber).
    pub fn publish_snapshot(&self, target: &str) {
        let books = {
            let state = self.state.lock();
            state.snapshot(true, usize::MAX)
        };
        for book in &books {
            self.publisher.publish_book_snapshot(target, book);
        }
    }

    fn flush(&self, reports: Vec<ExecutionReport>, updates: Vec<BookUpdate>) {
        for report in &reports {
            self.publisher.publish_execution_report(report);
        }
        for update in &updates {
            self.publisher.publish_book_update(update);
        }
    }

    #[cfg(test)]
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&MarketState) -> R) -> R {
        f(&self.state.lock())
    }
}
