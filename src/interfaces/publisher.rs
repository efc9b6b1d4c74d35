// ============================================================================
// Publisher Interface
// Contract for handing executions and book records to the transport layer
// ============================================================================

use crate::domain::{BookUpdate, ExecutionReport};
use crossbeam::channel::{unbounded, Receiver, Sender};

/// Outbound seam between a market and the (out-of-scope) wire transport.
///
/// Implementations are responsible for encoding and fan-out; the matching
/// core never performs network I/O itself, and no book lock is held while
/// these methods run.
pub trait MarketPublisher: Send + Sync {
    /// One execution report (trade, cancel confirmation or price update).
    fn publish_execution_report(&self, report: &ExecutionReport);

    /// One order-book delta for a level whose size changed.
    fn publish_book_update(&self, update: &BookUpdate);

    /// Full serialization of one book for a cold subscriber. `target` is
    /// the subscriber's session id; empty means every subscriber. The
    /// first entry is always a zero-price/zero-size clear marker and the
    /// rest run from worst to best price.
    fn publish_book_snapshot(&self, target: &str, book: &[BookUpdate]);
}

/// Discards everything; used in tests and benchmarks.
pub struct NoOpPublisher;

impl MarketPublisher for NoOpPublisher {
    fn publish_execution_report(&self, _report: &ExecutionReport) {}

    fn publish_book_update(&self, _update: &BookUpdate) {}

    fn publish_book_snapshot(&self, _target: &str, _book: &[BookUpdate]) {}
}

/// Logs every record through `tracing`.
pub struct LoggingPublisher;

impl MarketPublisher for LoggingPublisher {
    fn publish_execution_report(&self, report: &ExecutionReport) {
        tracing::debug!(?report, "execution report");
    }

    fn publish_book_update(&self, update: &BookUpdate) {
        tracing::debug!(?update, "book update");
    }

    fn publish_book_snapshot(&self, target: &str, book: &[BookUpdate]) {
        tracing::debug!(target_id = target, entries = book.len(), "book snapshot");
    }
}

/// Forwards every record over crossbeam channels; the receiving ends are
/// what a transport task (or a test) drains.
pub struct ChannelPublisher {
    reports: Sender<ExecutionReport>,
    updates: Sender<BookUpdate>,
    snapshots: Sender<(String, Vec<BookUpdate>)>,
}

/// Receiving halves of a [`ChannelPublisher`].
pub struct PublisherReceivers {
    pub reports: Receiver<ExecutionReport>,
    pub updates: Receiver<BookUpdate>,
    pub snapshots: Receiver<(String, Vec<BookUpdate>)>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, PublisherReceivers) {
        let (report_tx, report_rx) = unbounded();
        let (update_tx, update_rx) = unbounded();
        let (snapshot_tx, snapshot_rx) = unbounded();
        (
            Self {
                reports: report_tx,
                updates: update_tx,
                snapshots: snapshot_tx,
            },
            PublisherReceivers {
                reports: report_rx,
                updates: update_rx,
                snapshots: snapshot_rx,
            },
        )
    }
}

impl MarketPublisher for ChannelPublisher {
    fn publish_execution_report(&self, report: &ExecutionReport) {
        let _ = self.reports.send(report.clone());
    }

    fn publish_book_update(&self, update: &BookUpdate) {
        let _ = self.updates.send(update.clone());
    }

    fn publish_book_snapshot(&self, target: &str, book: &[BookUpdate]) {
        let _ = self.snapshots.send((target.to_string(), book.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookRecord, Decision, ExecutionReport};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_channel_publisher_forwards_records() {
        let (publisher, receivers) = ChannelPublisher::new();

        let report = ExecutionReport::price_update("AAPL", dec!(100.00), 10, "FEED", Utc::now());
        publisher.publish_execution_report(&report);

        let update = BookUpdate::local(BookRecord::LocalBid, "AAPL", dec!(99.99), 50, Utc::now());
        publisher.publish_book_update(&update);
        publisher.publish_book_snapshot("session-1", &[update.clone()]);

        assert_eq!(receivers.reports.recv().unwrap().decision, Decision::PriceUpdate);
        assert_eq!(receivers.updates.recv().unwrap().price, dec!(99.99));

        let (target, book) = receivers.snapshots.recv().unwrap();
        assert_eq!(target, "session-1");
        assert_eq!(book.len(), 1);
    }
}
