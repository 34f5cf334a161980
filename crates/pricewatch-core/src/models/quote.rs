//! Market quote model

use serde::{Deserialize, Serialize};

/// Price snapshot plus auxiliary fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol as reported by the provider
    pub symbol: String,
    /// Last traded price
    pub price: f64,
    /// Absolute change versus previous close
    pub change: f64,
    /// Percent change versus previous close
    pub change_percent: f64,
    /// Previous session close
    pub previous_close: f64,
    /// Session volume
    pub volume: u64,
}

impl Quote {
    /// Whether the price moved up (or stayed flat) versus the previous close
    pub fn is_up(&self) -> bool {
        self.change >= 0.0
    }
}
