//! Configuration management for PriceWatch

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Environment variable prefix, e.g. `PRICEWATCH_PROVIDER__API_KEY`
pub const ENV_PREFIX: &str = "PRICEWATCH";

/// Fallback environment variable for the provider key
pub const API_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP command surface
    pub server: ServerConfig,

    /// Upstream price provider
    pub provider: ProviderConfig,

    /// Scheduler loop
    pub scheduler: SchedulerConfig,

    /// Alert store
    pub store: StoreConfig,

    /// Notification delivery
    pub notifier: NotifierConfig,

    /// Metrics exporter
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// Later sources override earlier ones. A `.env` file in the working
    /// directory is loaded first if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.check_interval.is_zero() {
            return Err(Error::config("scheduler.check_interval must be greater than zero"));
        }
        if self.scheduler.notification_queue == 0 {
            return Err(Error::config("scheduler.notification_queue must be at least 1"));
        }
        if self.provider.request_timeout.is_zero() {
            return Err(Error::config("provider.request_timeout must be greater than zero"));
        }
        if !matches!(self.provider.base_url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "provider.base_url must be http(s), got '{}'",
                self.provider.base_url
            )));
        }
        if self.store.history_limit == 0 {
            return Err(Error::config("store.history_limit must be at least 1"));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP API port
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Upstream price provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Quote endpoint
    pub base_url: Url,
    /// API key; falls back to `ALPHA_VANTAGE_API_KEY`
    pub api_key: Option<String>,
    /// Minimum spacing between upstream requests (free tier: 5/min)
    #[serde(with = "humantime_serde")]
    pub min_request_interval: Duration,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://www.alphavantage.co/query").expect("static URL is valid"),
            api_key: None,
            min_request_interval: Duration::from_secs(12),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period between ticks
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    /// Minimum time between two firings of one alert
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    /// Capacity of the notification queue
    pub notification_queue: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            cooldown: Duration::from_secs(300),
            notification_queue: 256,
        }
    }
}

/// Alert store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum trigger events kept in memory
    pub history_limit: usize,
    /// JSON snapshot loaded on start and written on shutdown
    pub snapshot_path: Option<PathBuf>,
    /// Confirm the symbol with a quote lookup before creating an alert
    pub verify_symbols: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_limit: 10_000,
            snapshot_path: None,
            verify_symbols: true,
        }
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Webhook receiving fired alerts; log-only delivery when unset
    pub webhook_url: Option<Url>,
    /// Extra headers sent with every webhook request
    pub webhook_headers: HashMap<String, String>,
    /// Webhook request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_headers: HashMap::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus exporter address; disabled when unset
    pub listen: Option<SocketAddr>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
