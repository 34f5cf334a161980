//! Alpha Vantage `GLOBAL_QUOTE` client

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{PriceSource, RateLimiter, UpstreamError};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::models::Quote;

/// Quote client for the Alpha Vantage REST API
#[derive(Clone)]
pub struct AlphaVantageClient {
    http: Client,
    base_url: Url,
    api_key: String,
    limiter: Arc<RateLimiter>,
}

impl AlphaVantageClient {
    /// Create a client that draws every request from `limiter`
    pub fn new(config: &ProviderConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            limiter,
        })
    }

    /// The shared limiter
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[async_trait::async_trait]
impl PriceSource for AlphaVantageClient {
    async fn fetch_quote(&self, symbol: &str) -> std::result::Result<Quote, UpstreamError> {
        if !self.has_key() {
            return Err(UpstreamError::MissingApiKey);
        }

        self.limiter.acquire().await;

        let res = self
            .http
            .get(self.base_url.clone())
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| UpstreamError::Http(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            warn!(symbol, status, "Quote request failed");
            return Err(UpstreamError::Status { status });
        }

        let body: GlobalQuoteResponse = res
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        let quote = body.into_quote(symbol)?;
        debug!(symbol, price = quote.price, "Fetched quote");
        Ok(quote)
    }
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<RawQuote>,

    // throttling notice
    #[serde(rename = "Note")]
    note: Option<String>,

    #[serde(rename = "Information")]
    information: Option<String>,

    // invalid call, usually a bad symbol
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

impl GlobalQuoteResponse {
    fn into_quote(self, requested: &str) -> std::result::Result<Quote, UpstreamError> {
        if let Some(msg) = self.note.or(self.information) {
            return Err(UpstreamError::Throttled(msg));
        }
        if self.error_message.is_some() {
            return Err(UpstreamError::UnknownSymbol(requested.to_string()));
        }

        let raw = match self.global_quote {
            Some(raw) if raw.price.is_some() => raw,
            _ => return Err(UpstreamError::UnknownSymbol(requested.to_string())),
        };

        let price = parse_number("05. price", raw.price.as_deref())?;
        if !price.is_finite() || price <= 0.0 {
            return Err(UpstreamError::Malformed(format!("non-positive price {price}")));
        }

        let change_percent = raw
            .change_percent
            .as_deref()
            .map(|s| s.trim().trim_end_matches('%'));

        Ok(Quote {
            symbol: raw
                .symbol
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| requested.to_string()),
            price,
            change: parse_optional("09. change", raw.change.as_deref())?,
            change_percent: parse_optional("10. change percent", change_percent)?,
            previous_close: parse_optional("08. previous close", raw.previous_close.as_deref())?,
            volume: match raw.volume.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => v
                    .parse::<u64>()
                    .map_err(|_| UpstreamError::Malformed(format!("06. volume = '{v}'")))?,
                _ => 0,
            },
        })
    }
}

fn parse_number(field: &str, value: Option<&str>) -> std::result::Result<f64, UpstreamError> {
    let value = value.map(str::trim).unwrap_or_default();
    value
        .parse::<f64>()
        .map_err(|_| UpstreamError::Malformed(format!("{field} = '{value}'")))
}

fn parse_optional(field: &str, value: Option<&str>) -> std::result::Result<f64, UpstreamError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => parse_number(field, Some(v)),
        _ => Ok(0.0),
    }
}
