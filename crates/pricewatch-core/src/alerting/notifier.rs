//! Notification hand-off and delivery for fired alerts

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::NotifierConfig;
use crate::error::{Error, Result};
use crate::models::{Alert, ComparisonKind, Quote, TriggerEvent};

/// A fired alert on its way to the owner
#[derive(Debug, Clone)]
pub struct Notification {
    pub alert: Alert,
    pub quote: Quote,
    pub event: TriggerEvent,
}

impl Notification {
    /// Human-readable message for chat-style channels
    pub fn message(&self) -> String {
        let headline = match self.alert.kind {
            ComparisonKind::Above => "rose to or above",
            ComparisonKind::Below => "fell to or below",
            ComparisonKind::Cross => "is crossing",
        };

        let mut text = format!(
            "{} {} {:.2} (now {:.2}, {:+.2} / {:+.2}%)",
            self.quote.symbol,
            headline,
            self.alert.threshold,
            self.quote.price,
            self.quote.change,
            self.quote.change_percent,
        );
        if let Some(note) = &self.alert.note {
            text.push_str(" - ");
            text.push_str(note);
        }
        text
    }
}

/// Delivery channel for notifications
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification
    async fn notify(&self, notification: &Notification) -> std::result::Result<(), NotificationError>;

    /// Channel name for logs
    fn name(&self) -> &'static str;
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    HttpError(String),
}

/// Create the bounded queue between the scheduler and the delivery task
pub fn notification_channel(
    capacity: usize,
    sink: Arc<dyn NotificationSink>,
) -> (NotificationQueue, NotificationDispatcher) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NotificationQueue { tx }, NotificationDispatcher { rx, sink })
}

/// Producer side of the notification queue
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    /// Enqueue without waiting; returns false if the notification was dropped
    pub fn enqueue(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(alert_id = %n.alert.id, "Notification queue full, dropping notification");
                metrics::counter!("pricewatch_notifications_dropped_total").increment(1);
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!(alert_id = %n.alert.id, "Notification queue closed, dropping notification");
                metrics::counter!("pricewatch_notifications_dropped_total").increment(1);
                false
            }
        }
    }

    /// Free slots in the queue
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Delivery statistics returned when the dispatcher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: usize,
    pub failed: usize,
}

/// Consumer side: delivers queued notifications to the sink
pub struct NotificationDispatcher {
    rx: mpsc::Receiver<Notification>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationDispatcher {
    /// Deliver until every queue handle is dropped and the queue is drained
    pub async fn run(mut self) -> DeliveryStats {
        info!(sink = self.sink.name(), "Starting notification dispatcher");
        let mut stats = DeliveryStats::default();

        while let Some(notification) = self.rx.recv().await {
            match self.sink.notify(&notification).await {
                Ok(()) => {
                    stats.delivered += 1;
                    debug!(alert_id = %notification.alert.id, sink = self.sink.name(), "Notification delivered");
                }
                Err(e) => {
                    stats.failed += 1;
                    metrics::counter!("pricewatch_notifications_failed_total").increment(1);
                    error!(
                        alert_id = %notification.alert.id,
                        owner_id = %notification.alert.owner_id,
                        sink = self.sink.name(),
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        }

        info!(delivered = stats.delivered, failed = stats.failed, "Notification dispatcher stopped");
        stats
    }
}

/// Pick the sink described by the configuration
pub fn build_sink(config: &NotifierConfig) -> Result<Arc<dyn NotificationSink>> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(WebhookSink::new(url.clone(), config)?)),
        None => Ok(Arc::new(LogSink)),
    }
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, notification: &Notification) -> std::result::Result<(), NotificationError> {
        info!(
            alert_id = %notification.alert.id,
            owner_id = %notification.alert.owner_id,
            symbol = %notification.quote.symbol,
            price = notification.quote.price,
            "{}",
            notification.message()
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Posts notifications as JSON to a webhook
pub struct WebhookSink {
    client: Client,
    url: Url,
}

impl WebhookSink {
    /// Create a webhook sink with the configured headers and timeout
    pub fn new(url: Url, config: &NotifierConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.webhook_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::config(format!("invalid webhook header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("invalid webhook header value for '{key}': {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, url })
    }
}

#[async_trait::async_trait]
impl NotificationSink for WebhookSink {
    async fn notify(&self, notification: &Notification) -> std::result::Result<(), NotificationError> {
        let payload = WebhookPayload::from(notification);

        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::HttpError(format!(
                "Webhook returned {}: {}",
                status, body
            )));
        }

        info!(alert_id = %notification.alert.id, url = %self.url, "Webhook notification sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

// Generic webhook payload
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    alert_id: String,
    owner_id: &'a str,
    symbol: &'a str,
    kind: ComparisonKind,
    threshold: f64,
    price: f64,
    change: f64,
    change_percent: f64,
    previous_close: f64,
    volume: u64,
    note: Option<&'a str>,
    message: String,
    triggered_at: DateTime<Utc>,
}

impl<'a> From<&'a Notification> for WebhookPayload<'a> {
    fn from(n: &'a Notification) -> Self {
        Self {
            alert_id: n.alert.id.to_string(),
            owner_id: &n.alert.owner_id,
            symbol: &n.alert.symbol,
            kind: n.alert.kind,
            threshold: n.alert.threshold,
            price: n.quote.price,
            change: n.quote.change,
            change_percent: n.quote.change_percent,
            previous_close: n.quote.previous_close,
            volume: n.quote.volume,
            note: n.alert.note.as_deref(),
            message: n.message(),
            triggered_at: n.event.triggered_at,
        }
    }
}
