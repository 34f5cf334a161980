//! In-memory price source for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{PriceSource, UpstreamError};
use crate::models::Quote;

/// Serves prices set by the test; unknown symbols are unavailable
#[derive(Default)]
pub struct StubPriceSource {
    quotes: RwLock<HashMap<String, Result<Quote, UpstreamError>>>,
    calls: RwLock<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl StubPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        let quote = Quote {
            symbol: symbol.to_string(),
            price,
            change: 1.25,
            change_percent: 0.83,
            previous_close: price - 1.25,
            volume: 1_000_000,
        };
        self.quotes.write().insert(symbol.to_string(), Ok(quote));
    }

    pub fn fail(&self, symbol: &str, error: UpstreamError) {
        self.quotes.write().insert(symbol.to_string(), Err(error));
    }

    pub fn calls_for(&self, symbol: &str) -> usize {
        self.calls.read().get(symbol).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PriceSource for StubPriceSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, UpstreamError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.write().entry(symbol.to_string()).or_insert(0) += 1;

        self.quotes
            .read()
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Err(UpstreamError::UnknownSymbol(symbol.to_string())))
    }
}
