//! Alert engine
//!
//! Owns the alert store and the shared price source. The HTTP surface and the
//! CLI talk to the engine; the scheduler gets `Arc` handles to the same
//! collaborators.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::alerting::{AlertDraft, AlertScheduler, AlertStore, NotificationQueue};
use crate::config::{Config, SchedulerConfig};
use crate::error::{Error, Result};
use crate::market::{AlphaVantageClient, PriceSource, RateLimiter, UpstreamError};
use crate::models::{Alert, AlertId, AlertSummary, MarketStatus, NewAlert, Quote, RECENT_TRIGGERS};

/// A freshly created alert and the quote used to confirm its symbol
#[derive(Debug, Clone, Serialize)]
pub struct CreatedAlert {
    pub alert: Alert,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
}

/// Command surface over the alert store and price source
pub struct AlertEngine {
    store: Arc<AlertStore>,
    prices: Arc<dyn PriceSource>,
    verify_symbols: bool,
}

impl AlertEngine {
    /// Create an engine from existing collaborators
    pub fn new(store: Arc<AlertStore>, prices: Arc<dyn PriceSource>, verify_symbols: bool) -> Self {
        Self {
            store,
            prices,
            verify_symbols,
        }
    }

    /// Build the store and the Alpha Vantage client described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(config.provider.min_request_interval));
        let client = AlphaVantageClient::new(&config.provider, limiter)?;
        let store = Arc::new(AlertStore::with_history_limit(config.store.history_limit));

        Ok(Self::new(store, Arc::new(client), config.store.verify_symbols))
    }

    /// The alert store
    pub fn store(&self) -> &Arc<AlertStore> {
        &self.store
    }

    /// The shared price source
    pub fn prices(&self) -> &Arc<dyn PriceSource> {
        &self.prices
    }

    /// Build a scheduler over this engine's store and price source
    pub fn scheduler(&self, queue: NotificationQueue, config: &SchedulerConfig) -> AlertScheduler {
        AlertScheduler::new(self.store.clone(), self.prices.clone(), queue, config)
    }

    /// Validate, optionally confirm the symbol upstream, then insert.
    ///
    /// Nothing is inserted unless every check passes.
    #[instrument(skip_all, fields(owner_id = %input.owner_id, symbol = %input.symbol))]
    pub async fn create_alert(&self, input: NewAlert) -> Result<CreatedAlert> {
        let draft = AlertDraft::try_from(input)?;

        let quote = if self.verify_symbols {
            let quote = self
                .prices
                .fetch_quote(&draft.symbol)
                .await
                .map_err(|e| lookup_error(&draft.symbol, e))?;
            debug!(price = quote.price, "Confirmed symbol");
            Some(quote)
        } else {
            None
        };

        let alert = self.store.insert(draft);
        Ok(CreatedAlert { alert, quote })
    }

    /// Remove an alert owned by `owner_id`
    pub fn remove_alert(&self, id: AlertId, owner_id: &str) -> bool {
        self.store.remove(id, owner_id)
    }

    /// Alerts owned by `owner_id`, in creation order
    pub fn list_alerts(&self, owner_id: &str) -> Vec<Alert> {
        self.store.list(owner_id)
    }

    /// Counts, per-symbol grouping and recent triggers for `owner_id`
    pub fn summary(&self, owner_id: &str) -> AlertSummary {
        let owner_id = owner_id.trim();
        let alerts = self.store.list(owner_id);
        let triggers = self.store.recent_triggers(owner_id, RECENT_TRIGGERS);
        AlertSummary::build(owner_id, alerts, triggers)
    }

    /// Pause or resume an alert on behalf of its owner
    pub fn set_active(&self, id: AlertId, owner_id: &str, active: bool) -> Result<Alert> {
        let alert = self
            .store
            .set_active_owned(id, owner_id, active)
            .ok_or_else(|| Error::not_found("Alert", id.to_string()))?;

        info!(alert_id = %id, owner_id, active, "Updated alert state");
        Ok(alert)
    }

    /// Which markets are in their regular session at `now`
    pub fn market_status(&self, now: DateTime<Utc>) -> MarketStatus {
        MarketStatus::at(now)
    }

    /// Ad-hoc quote lookup through the shared limiter
    pub async fn quote(&self, symbol: &str) -> Result<Quote> {
        let symbol = crate::alerting::normalize_symbol(symbol)?;
        self.prices
            .fetch_quote(&symbol)
            .await
            .map_err(|e| lookup_error(&symbol, e))
    }
}

// a bad symbol is the caller's fault, anything else is the provider's
fn lookup_error(symbol: &str, err: UpstreamError) -> Error {
    if err.is_symbol_error() {
        Error::UnknownSymbol(symbol.to_string())
    } else {
        Error::Upstream(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::testing::StubPriceSource;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn engine(verify: bool) -> (AlertEngine, Arc<StubPriceSource>) {
        let prices = Arc::new(StubPriceSource::new());
        let engine = AlertEngine::new(Arc::new(AlertStore::new()), prices.clone(), verify);
        (engine, prices)
    }

    #[tokio::test]
    async fn test_create_confirms_symbol_once() {
        let (engine, prices) = engine(true);
        prices.set_price("AAPL", 151.0);

        let created = engine
            .create_alert(NewAlert::new("u1", " aapl ", 150.0, "Above", Some("take profit".into())))
            .await
            .unwrap();

        assert_eq!(created.alert.symbol, "AAPL");
        assert_eq!(created.quote.map(|q| q.price), Some(151.0));
        assert_eq!(prices.calls_for("AAPL"), 1);
        assert_eq!(engine.list_alerts("u1"), vec![created.alert]);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_symbol_without_insert() {
        let (engine, _prices) = engine(true);

        let err = engine
            .create_alert(NewAlert::new("u1", "NOPE", 1.0, "above", None))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownSymbol(ref s) if s == "NOPE"));
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn test_create_reports_transport_failure_as_upstream() {
        let (engine, prices) = engine(true);
        prices.fail("AAPL", UpstreamError::Status { status: 503 });

        let err = engine
            .create_alert(NewAlert::new("u1", "AAPL", 1.0, "above", None))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream(UpstreamError::Status { status: 503 })));
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn test_validation_precedes_lookup() {
        let (engine, prices) = engine(true);
        prices.set_price("AAPL", 151.0);

        let err = engine
            .create_alert(NewAlert::new("u1", "AAPL", 150.0, "sideways", None))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidKind(_)));
        assert_eq!(prices.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_without_verification() {
        let (engine, prices) = engine(false);

        let created = engine
            .create_alert(NewAlert::new("u1", "SPX", 7000.0, "below", None))
            .await
            .unwrap();

        assert!(created.quote.is_none());
        assert_eq!(prices.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_remove_respects_owner() {
        let (engine, _prices) = engine(false);
        let id = engine
            .create_alert(NewAlert::new("ownerA", "AAPL", 150.0, "above", None))
            .await
            .unwrap()
            .alert
            .id;

        assert!(!engine.remove_alert(id, "ownerB"));
        assert!(engine.store().get(id).is_some());
        assert!(engine.remove_alert(id, "ownerA"));
        assert!(!engine.remove_alert(id, "ownerA"));
    }

    #[tokio::test]
    async fn test_set_active_not_found_for_other_owner() {
        let (engine, _prices) = engine(false);
        let id = engine
            .create_alert(NewAlert::new("u1", "AAPL", 150.0, "above", None))
            .await
            .unwrap()
            .alert
            .id;

        assert!(matches!(
            engine.set_active(id, "u2", false).unwrap_err(),
            Error::NotFound { .. }
        ));
        assert!(!engine.set_active(id, "u1", false).unwrap().active);
        assert!(engine.set_active(id, "u1", true).unwrap().active);
    }

    #[tokio::test]
    async fn test_summary_groups_by_symbol() {
        let (engine, _prices) = engine(false);
        for (symbol, threshold) in [("AAPL", 150.0), ("MSFT", 300.0), ("AAPL", 140.0)] {
            engine
                .create_alert(NewAlert::new("u1", symbol, threshold, "above", None))
                .await
                .unwrap();
        }
        engine
            .create_alert(NewAlert::new("u2", "TSLA", 200.0, "below", None))
            .await
            .unwrap();

        let summary = engine.summary("u1");

        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.active_count, 3);
        assert_eq!(summary.by_symbol.keys().collect::<Vec<_>>(), vec!["AAPL", "MSFT"]);
        assert_eq!(summary.by_symbol["AAPL"].len(), 2);
        assert!(summary.recent_triggers.is_empty());

        let padded = engine.summary(" u1 ");
        assert_eq!(padded.owner_id, "u1");
        assert_eq!(padded.total_count, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_get_distinct_ids() {
        let (engine, _prices) = engine(false);
        let engine = Arc::new(engine);

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .create_alert(NewAlert::new(format!("u{}", i % 4), "AAPL", 100.0, "above", None))
                        .await
                        .unwrap()
                        .alert
                        .id
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap());
        }
        assert_eq!(ids.len(), 64);
        assert_eq!(engine.store().len(), 64);
    }

    #[test]
    fn test_market_status_needs_no_quotes() {
        let (engine, prices) = engine(true);
        let sunday = "2024-05-12T15:00:00Z".parse().unwrap();

        let status = engine.market_status(sunday);

        assert!(!status.us_market_open);
        assert!(!status.ihsg_market_open);
        assert!(status.crypto_market_open);
        assert_eq!(prices.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_quote_normalizes_symbol() {
        let (engine, prices) = engine(false);
        prices.set_price("MSFT", 410.5);

        assert_eq!(engine.quote("msft").await.unwrap().price, 410.5);
        assert!(matches!(engine.quote("").await.unwrap_err(), Error::Validation(_)));
        assert!(matches!(engine.quote("ZZZZ").await.unwrap_err(), Error::UnknownSymbol(_)));
    }
}
