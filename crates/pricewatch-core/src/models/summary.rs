//! Per-owner alert summary

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::alert::{Alert, TriggerEvent};

/// Number of recent triggers included in a summary
pub const RECENT_TRIGGERS: usize = 5;

/// Aggregate view of one owner's alerts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    /// Owner the summary was built for
    pub owner_id: String,
    /// Total alerts owned
    pub total_count: usize,
    /// Alerts currently evaluated by the scheduler
    pub active_count: usize,
    /// Alerts grouped by symbol, each group in creation order
    pub by_symbol: BTreeMap<String, Vec<Alert>>,
    /// Latest triggers for the owner, newest first
    pub recent_triggers: Vec<TriggerEvent>,
}

impl AlertSummary {
    /// Build a summary from an owner's alert snapshot and trigger history.
    ///
    /// `alerts` must already be scoped to `owner_id`; triggers of other owners
    /// are filtered out here.
    pub fn build(
        owner_id: impl Into<String>,
        alerts: Vec<Alert>,
        triggers: impl IntoIterator<Item = TriggerEvent>,
    ) -> Self {
        let owner_id = owner_id.into();
        let total_count = alerts.len();
        let active_count = alerts.iter().filter(|a| a.active).count();

        let mut by_symbol: BTreeMap<String, Vec<Alert>> = BTreeMap::new();
        for alert in alerts {
            by_symbol.entry(alert.symbol.clone()).or_default().push(alert);
        }

        let mut recent_triggers: Vec<TriggerEvent> = triggers
            .into_iter()
            .filter(|t| t.owner_id == owner_id)
            .collect();
        recent_triggers.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        recent_triggers.truncate(RECENT_TRIGGERS);

        Self {
            owner_id,
            total_count,
            active_count,
            by_symbol,
            recent_triggers,
        }
    }
}
