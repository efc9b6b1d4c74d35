// ============================================================================
// Market Worker
// One dedicated polling thread per symbol
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::market::Market;

/// How long a worker backs off when its market has nothing to do. The
/// eligibility test depends on a moving clock, so the loop never blocks
/// on queue emptiness.
const IDLE_BACKOFF: Duration = Duration::from_micros(500);

/// Drive one market until `shutdown` is raised. All book mutations for
/// the symbol happen on this thread, so they are totally ordered.
pub fn run_market(market: Arc<Market>, shutdown: Arc<AtomicBool>) {
    tracing::info!(symbol = market.symbol(), "market worker started");
    while !shutdown.load(Ordering::Relaxed) {
        if !market.poll() {
            thread::sleep(IDLE_BACKOFF);
        }
    }
    tracing::info!(symbol = market.symbol(), "market worker stopped");
}

/// Spawn a named worker thread for one market.
pub fn spawn_market(
    market: Arc<Market>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("market-{}", market.symbol()))
        .spawn(move || run_market(market, shutdown))
}
