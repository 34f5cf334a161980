//! # PriceWatch
//!
//! Price threshold alerts for stocks and indices.
//!
//! Users register alerts of the form "notify me when SYMBOL is above, below
//! or crossing PRICE". A background scheduler samples quotes on a fixed
//! period, fires alerts whose condition holds and hands them to a
//! notification sink.
//!
//! ## Architecture
//!
//! - **Store**: concurrency-safe alert registry and trigger history
//! - **Market**: rate-limited quote client for the Alpha Vantage API
//! - **Scheduler**: periodic evaluation with per-alert cooldown
//! - **Notifier**: bounded queue feeding a log or webhook sink
//! - **API**: REST command surface over the engine
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the scheduler and HTTP API
//! PRICEWATCH_PROVIDER__API_KEY=... pricewatch serve
//!
//! # Look up a single quote
//! pricewatch price AAPL
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod market;
pub mod models;

pub use config::Config;
pub use engine::AlertEngine;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertScheduler, AlertStore, NotificationSink};
    pub use crate::config::Config;
    pub use crate::engine::AlertEngine;
    pub use crate::error::{Error, Result};
    pub use crate::market::PriceSource;
    pub use crate::models::*;
}
