// ============================================================================
// Interfaces Module
// Outbound seams between the matching core and its surroundings
// ============================================================================

pub mod publisher;

pub use publisher::{
    ChannelPublisher, LoggingPublisher, MarketPublisher, NoOpPublisher, PublisherReceivers,
};
