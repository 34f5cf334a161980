//! Alerting system for PriceWatch
//!
//! Holds the alert registry, decides when a sampled price fires an alert,
//! runs the periodic check loop and delivers notifications.

mod evaluator;
mod notifier;
mod scheduler;
mod store;

pub use evaluator::{fires, CROSS_TOLERANCE};
pub use notifier::{
    build_sink, notification_channel, DeliveryStats, LogSink, Notification, NotificationDispatcher,
    NotificationError, NotificationQueue, NotificationSink, WebhookSink,
};
pub use scheduler::{AlertScheduler, TickReport};
pub use store::{normalize_symbol, AlertDraft, AlertStore, TriggerMark, DEFAULT_HISTORY_LIMIT};
