// ============================================================================
// Domain Models Module
// Core value objects shared by every market discipline
// ============================================================================

pub mod book;
pub mod order;
pub mod price_level;
pub mod report;

pub use book::{GlobalBook, LocalBook, Side};
pub use order::{Order, OrderType, FEED_DESTINATION, LOCAL_DESTINATION};
pub use price_level::PriceLevel;
pub use report::{BookRecord, BookUpdate, Decision, ExecutionReport};
