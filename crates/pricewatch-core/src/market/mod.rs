//! Market data boundary
//!
//! Every quote request goes through a [`PriceSource`]. The Alpha Vantage
//! client serializes its requests through one shared [`RateLimiter`] so the
//! scheduler and ad-hoc lookups draw from the same provider quota.

mod alpha_vantage;
mod limiter;
#[cfg(test)]
pub(crate) mod testing;

pub use alpha_vantage::AlphaVantageClient;
pub use limiter::RateLimiter;

use crate::models::Quote;

/// Reasons a quote is unavailable
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    #[error("price provider API key is not configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(String),

    #[error("provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("provider throttled the request: {0}")]
    Throttled(String),

    #[error("malformed quote payload: {0}")]
    Malformed(String),

    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
}

impl UpstreamError {
    /// Whether the failure says the symbol itself is bad rather than the transport
    pub fn is_symbol_error(&self) -> bool {
        matches!(self, Self::UnknownSymbol(_) | Self::Malformed(_))
    }
}

/// Source of prices and quotes for a symbol
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch a full quote
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, UpstreamError>;

    /// Fetch just the last price.
    ///
    /// Callers that also need the quote should call `fetch_quote` once and
    /// read `price` from it instead of spending two requests.
    async fn fetch_price(&self, symbol: &str) -> Result<f64, UpstreamError> {
        self.fetch_quote(symbol).await.map(|quote| quote.price)
    }
}
