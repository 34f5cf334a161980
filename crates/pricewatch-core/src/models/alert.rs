//! Alert data models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Unique alert identifier, allocated from a monotonic counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlertId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(AlertId)
            .map_err(|_| Error::validation(format!("invalid alert id '{s}'")))
    }
}

/// Comparison applied between the observed price and the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonKind {
    /// Price at or above the threshold
    Above,
    /// Price at or below the threshold
    Below,
    /// Price within one cent of the threshold
    Cross,
}

impl ComparisonKind {
    /// All supported kinds, in display order
    pub const ALL: [ComparisonKind; 3] = [Self::Above, Self::Below, Self::Cross];

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
            Self::Cross => "cross",
        }
    }
}

impl fmt::Display for ComparisonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "above" => Ok(Self::Above),
            "below" => Ok(Self::Below),
            "cross" => Ok(Self::Cross),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

/// A standing instruction to notify an owner when a symbol's price meets a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier
    pub id: AlertId,

    /// Owner who created the alert
    pub owner_id: String,

    /// Upper-cased ticker symbol
    pub symbol: String,

    /// Threshold price
    pub threshold: f64,

    /// Comparison kind
    pub kind: ComparisonKind,

    /// Free-text note attached by the owner
    pub note: Option<String>,

    /// Whether the scheduler evaluates this alert
    pub active: bool,

    /// When the alert was created
    pub created_at: DateTime<Utc>,

    /// Last time this alert fired
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Whether the alert is still cooling down from its last trigger at `now`
    pub fn in_cooldown(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.last_triggered_at {
            Some(last) => now.signed_duration_since(last) < cooldown,
            None => false,
        }
    }
}

/// Input for creating a new alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlert {
    pub owner_id: String,
    pub symbol: String,
    pub threshold: f64,
    pub kind: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewAlert {
    /// Convenience constructor
    pub fn new(
        owner_id: impl Into<String>,
        symbol: impl Into<String>,
        threshold: f64,
        kind: impl Into<String>,
        note: Option<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            symbol: symbol.into(),
            threshold,
            kind: kind.into(),
            note,
        }
    }
}

/// History record of a single firing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// The alert that fired
    pub alert_id: AlertId,

    /// Symbol of the alert
    pub symbol: String,

    /// Threshold at the time of firing
    pub threshold: f64,

    /// Price observed by the scheduler
    pub observed_price: f64,

    /// Comparison kind
    pub kind: ComparisonKind,

    /// When the alert fired
    pub triggered_at: DateTime<Utc>,

    /// Owner of the alert
    pub owner_id: String,
}

impl TriggerEvent {
    /// Build the event for `alert` firing at `price`
    pub fn new(alert: &Alert, price: f64, triggered_at: DateTime<Utc>) -> Self {
        Self {
            alert_id: alert.id,
            symbol: alert.symbol.clone(),
            threshold: alert.threshold,
            observed_price: price,
            kind: alert.kind,
            triggered_at,
            owner_id: alert.owner_id.clone(),
        }
    }
}
