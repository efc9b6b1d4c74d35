// ============================================================================
// Engine Module
// Per-symbol markets, matching disciplines, registry and workers
// ============================================================================

pub mod continuous;
pub mod fba;
pub mod market;
pub mod registry;
pub mod worker;

pub use market::{Discipline, Market};
pub use registry::{MarketCtor, MarketError, MarketParam, MarketRegistry};
pub use worker::{run_market, spawn_market};
