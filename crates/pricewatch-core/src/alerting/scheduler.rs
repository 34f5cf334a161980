//! Periodic alert evaluation loop

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::market::{PriceSource, UpstreamError};
use crate::models::{Alert, Quote, TriggerEvent};

use super::evaluator::fires;
use super::notifier::{Notification, NotificationQueue};
use super::store::{AlertStore, TriggerMark};

/// Outcome of processing one alert in a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Paused,
    Cooldown,
    Unavailable,
    NotFired,
    Removed,
    Fired { enqueued: bool },
}

/// Source of timestamps for one tick
#[derive(Debug, Clone, Copy)]
enum Clock {
    Wall,
    Fixed(DateTime<Utc>),
}

impl Clock {
    fn now(self) -> DateTime<Utc> {
        match self {
            Self::Wall => Utc::now(),
            Self::Fixed(at) => at,
        }
    }
}

/// Counters for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Alerts whose price was compared against the threshold
    pub evaluated: usize,
    /// Alerts that fired but were paused after the tick started
    pub skipped_inactive: usize,
    /// Alerts skipped because they fired recently
    pub skipped_cooldown: usize,
    /// Alerts skipped because no quote was available
    pub unavailable: usize,
    /// Alerts that fired
    pub fired: usize,
    /// Fired alerts whose notification could not be enqueued
    pub dropped: usize,
    /// Alerts whose processing panicked
    pub failed: usize,
    /// Whether the tick stopped early on shutdown
    pub interrupted: bool,
}

/// Samples prices for active alerts on a fixed period and hands fired
/// alerts to the notification queue
pub struct AlertScheduler {
    store: Arc<AlertStore>,
    prices: Arc<dyn PriceSource>,
    queue: NotificationQueue,
    check_interval: Duration,
    cooldown: chrono::Duration,
}

impl AlertScheduler {
    /// Create a new alert scheduler
    pub fn new(
        store: Arc<AlertStore>,
        prices: Arc<dyn PriceSource>,
        queue: NotificationQueue,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            store,
            prices,
            queue,
            check_interval: config.check_interval,
            cooldown: chrono::Duration::from_std(config.cooldown)
                .unwrap_or_else(|_| chrono::Duration::weeks(52_000)),
        }
    }

    /// Run ticks until `shutdown` is cancelled.
    ///
    /// Consumes the scheduler so its queue handle is dropped on return, which
    /// lets the dispatcher drain and stop.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval = %humantime::format_duration(self.check_interval),
            cooldown_secs = self.cooldown.num_seconds(),
            "Starting alert scheduler"
        );

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = self.run_tick(Clock::Wall, Some(&shutdown)).await;
            metrics::counter!("pricewatch_ticks_total").increment(1);

            if report.fired > 0 || report.unavailable > 0 || report.failed > 0 {
                info!(?report, "Tick complete");
            } else {
                debug!(?report, "Tick complete");
            }
        }

        info!("Alert scheduler stopped");
    }

    /// Evaluate every active alert once, with every timestamp taken as `now`.
    ///
    /// The running loop instead reads the wall clock per alert, so events are
    /// stamped when their quote arrived.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        self.run_tick(Clock::Fixed(now), None).await
    }

    async fn run_tick(&self, clock: Clock, shutdown: Option<&CancellationToken>) -> TickReport {
        let alerts = self.store.active_snapshot();
        let mut report = TickReport::default();

        debug!(count = alerts.len(), "Evaluating alerts");

        // one upstream request per symbol per tick, failures included
        let mut quotes: HashMap<String, Result<Quote, UpstreamError>> = HashMap::new();

        for alert in alerts {
            if shutdown.is_some_and(CancellationToken::is_cancelled) {
                debug!("Shutdown requested, ending tick early");
                report.interrupted = true;
                break;
            }

            let alert_id = alert.id;
            let outcome = AssertUnwindSafe(self.process(alert, clock, &mut quotes))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Outcome::Paused) => report.skipped_inactive += 1,
                Ok(Outcome::Cooldown) => report.skipped_cooldown += 1,
                Ok(Outcome::Unavailable) => report.unavailable += 1,
                Ok(Outcome::NotFired) | Ok(Outcome::Removed) => report.evaluated += 1,
                Ok(Outcome::Fired { enqueued }) => {
                    report.evaluated += 1;
                    report.fired += 1;
                    if !enqueued {
                        report.dropped += 1;
                    }
                }
                Err(_) => {
                    report.failed += 1;
                    error!(alert_id = %alert_id, "Alert processing panicked");
                }
            }
        }

        report
    }

    async fn process(
        &self,
        mut alert: Alert,
        clock: Clock,
        quotes: &mut HashMap<String, Result<Quote, UpstreamError>>,
    ) -> Outcome {
        if alert.in_cooldown(clock.now(), self.cooldown) {
            debug!(alert_id = %alert.id, "Alert in cooldown");
            return Outcome::Cooldown;
        }

        let quote = match quotes.get(&alert.symbol) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = self.prices.fetch_quote(&alert.symbol).await;
                if let Err(e) = &fetched {
                    metrics::counter!("pricewatch_upstream_failures_total").increment(1);
                    warn!(symbol = %alert.symbol, error = %e, "Quote unavailable, skipping symbol this tick");
                }
                quotes.insert(alert.symbol.clone(), fetched.clone());
                fetched
            }
        };

        let Ok(quote) = quote else {
            return Outcome::Unavailable;
        };

        let fired = fires(alert.kind, alert.threshold, quote.price);

        debug!(
            alert_id = %alert.id,
            symbol = %alert.symbol,
            kind = %alert.kind,
            threshold = alert.threshold,
            price = quote.price,
            fired,
            "Evaluated alert"
        );

        if !fired {
            return Outcome::NotFired;
        }

        let now = clock.now();
        match self.store.set_triggered(alert.id, now) {
            TriggerMark::Marked => {}
            TriggerMark::Paused => {
                debug!(alert_id = %alert.id, "Alert paused during tick");
                return Outcome::Paused;
            }
            TriggerMark::Missing => {
                debug!(alert_id = %alert.id, "Alert removed during tick");
                return Outcome::Removed;
            }
        }
        alert.last_triggered_at = Some(now);

        let event = TriggerEvent::new(&alert, quote.price, now);
        self.store.record_trigger(event.clone());
        metrics::counter!("pricewatch_triggers_total").increment(1);

        info!(
            alert_id = %alert.id,
            owner_id = %alert.owner_id,
            symbol = %alert.symbol,
            price = quote.price,
            threshold = alert.threshold,
            "Alert triggered"
        );

        let enqueued = self.queue.enqueue(Notification { alert, quote, event });
        Outcome::Fired { enqueued }
    }
}
