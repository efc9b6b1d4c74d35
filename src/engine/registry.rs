// ============================================================================
// Market Registry
// Explicit name-to-constructor table for the supported disciplines
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::clock::SimClock;
use crate::interfaces::MarketPublisher;

use super::market::Market;

/// A creation parameter for a registered market type.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketParam {
    Text(String),
    Number(f64),
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("market type `{0}` is already registered")]
    DuplicateMarket(String),
    #[error("unknown market type `{0}`")]
    UnknownMarket(String),
    #[error("invalid parameters for market type `{0}`: {1}")]
    InvalidParameters(&'static str, &'static str),
}

/// Constructor signature every registered market type satisfies.
pub type MarketCtor =
    fn(&str, &[MarketParam], SimClock, Arc<dyn MarketPublisher>) -> Result<Market, MarketError>;

/// Maps market-type names to constructors so a simulation config can
/// pick a discipline by name.
pub struct MarketRegistry {
    ctors: HashMap<String, MarketCtor>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in disciplines: `continuous`
    /// (no parameters) and `fba` (one numeric parameter, the batch
    /// interval in simulated seconds).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // the names are fixed, so registration cannot collide here
        let _ = registry.register("continuous", make_continuous);
        let _ = registry.register("fba", make_frequent_batch);
        registry
    }

    /// Register a market type under a unique name.
    pub fn register(&mut self, name: &str, ctor: MarketCtor) -> Result<(), MarketError> {
        if self.ctors.contains_key(name) {
            return Err(MarketError::DuplicateMarket(name.to_string()));
        }
        self.ctors.insert(name.to_string(), ctor);
        Ok(())
    }

    /// Build a market of the named type for one symbol.
    pub fn create(
        &self,
        name: &str,
        symbol: &str,
        params: &[MarketParam],
        clock: SimClock,
        publisher: Arc<dyn MarketPublisher>,
    ) -> Result<Market, MarketError> {
        let ctor = self
            .ctors
            .get(name)
            .ok_or_else(|| MarketError::UnknownMarket(name.to_string()))?;
        ctor(symbol, params, clock, publisher)
    }

    pub fn market_types(&self) -> impl Iterator<Item = &str> {
        self.ctors.keys().map(String::as_str)
    }
}

impl Default for MarketRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn make_continuous(
    symbol: &str,
    _params: &[MarketParam],
    clock: SimClock,
    publisher: Arc<dyn MarketPublisher>,
) -> Result<Market, MarketError> {
    Ok(Market::continuous(symbol, clock, publisher))
}

fn make_frequent_batch(
    symbol: &str,
    params: &[MarketParam],
    clock: SimClock,
    publisher: Arc<dyn MarketPublisher>,
) -> Result<Market, MarketError> {
    let interval_s = match params.first() {
        Some(MarketParam::Number(interval_s)) if *interval_s > 0.0 => *interval_s,
        Some(_) => {
            return Err(MarketError::InvalidParameters(
                "fba",
                "batch interval must be a positive number of seconds",
            ))
        },
        None => {
            return Err(MarketError::InvalidParameters(
                "fba",
                "missing batch interval parameter",
            ))
        },
    };
    Ok(Market::frequent_batch(symbol, interval_s, clock, publisher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Discipline;
    use crate::interfaces::NoOpPublisher;

    fn deps() -> (SimClock, Arc<dyn MarketPublisher>) {
        (SimClock::manual(), Arc::new(NoOpPublisher))
    }

    #[test]
    fn test_builtins_create_both_disciplines() {
        let registry = MarketRegistry::with_builtins();
        let (clock, publisher) = deps();

        let continuous = registry
            .create("continuous", "AAPL", &[], clock.clone(), publisher.clone())
            .unwrap();
        assert_eq!(continuous.discipline(), Discipline::Continuous);
        assert_eq!(continuous.symbol(), "AAPL");

        let fba = registry
            .create(
                "fba",
                "MSFT",
                &[MarketParam::Number(5.0)],
                clock,
                publisher,
            )
            .unwrap();
        assert_eq!(fba.discipline(), Discipline::FrequentBatch);
    }

    #[test]
    fn test_unknown_market_type_is_an_error() {
        let registry = MarketRegistry::with_builtins();
        let (clock, publisher) = deps();

        let err = registry
            .create("call-auction", "AAPL", &[], clock, publisher)
            .unwrap_err();
        assert!(matches!(err, MarketError::UnknownMarket(name) if name == "call-auction"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = MarketRegistry::with_builtins();
        let err = registry.register("fba", make_frequent_batch).unwrap_err();
        assert!(matches!(err, MarketError::DuplicateMarket(_)));
    }

    #[test]
    fn test_fba_requires_a_positive_interval() {
        let registry = MarketRegistry::with_builtins();

        let (clock, publisher) = deps();
        let err = registry.create("fba", "AAPL", &[], clock, publisher).unwrap_err();
        assert!(matches!(err, MarketError::InvalidParameters("fba", _)));

        let (clock, publisher) = deps();
        let err = registry
            .create("fba", "AAPL", &[MarketParam::Number(0.0)], clock, publisher)
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidParameters("fba", _)));
    }
}
