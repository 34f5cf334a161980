//! In-memory alert registry and trigger history

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{Alert, AlertId, ComparisonKind, NewAlert, TriggerEvent};

static SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9.^=_:\-]{1,20}$").expect("symbol pattern is valid"));

/// Default number of trigger events retained
pub const DEFAULT_HISTORY_LIMIT: usize = 10_000;

/// Trim, upper-case and validate a ticker symbol
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(Error::validation("symbol must not be empty"));
    }
    if !SYMBOL_RE.is_match(&symbol) {
        return Err(Error::validation(format!("invalid symbol '{symbol}'")));
    }
    Ok(symbol)
}

/// Outcome of [`AlertStore::set_triggered`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMark {
    /// `last_triggered_at` was updated
    Marked,
    /// The alert was paused since it was read; left untouched
    Paused,
    /// The alert no longer exists
    Missing,
}

/// A validated alert waiting for an id
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub owner_id: String,
    pub symbol: String,
    pub threshold: f64,
    pub kind: ComparisonKind,
    pub note: Option<String>,
}

impl TryFrom<NewAlert> for AlertDraft {
    type Error = Error;

    fn try_from(input: NewAlert) -> Result<Self> {
        let owner_id = input.owner_id.trim().to_string();
        if owner_id.is_empty() {
            return Err(Error::validation("owner id must not be empty"));
        }

        let kind: ComparisonKind = input.kind.parse()?;

        if !input.threshold.is_finite() {
            return Err(Error::InvalidThreshold(format!(
                "threshold must be a finite number, got {}",
                input.threshold
            )));
        }

        let symbol = normalize_symbol(&input.symbol)?;

        let note = input
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(Self {
            owner_id,
            symbol,
            threshold: input.threshold,
            kind,
            note,
        })
    }
}

/// Serialized form of the alert set
#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot {
    saved_at: DateTime<Utc>,
    alerts: Vec<Alert>,
}

/// Concurrency-safe registry of alerts, scoped by owner.
///
/// Reads clone out of the lock, so a returned list is never affected by
/// later mutation.
pub struct AlertStore {
    alerts: RwLock<BTreeMap<AlertId, Alert>>,
    history: RwLock<VecDeque<TriggerEvent>>,
    next_id: AtomicU64,
    history_limit: usize,
}

impl AlertStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Create an empty store keeping at most `history_limit` trigger events
    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            alerts: RwLock::new(BTreeMap::new()),
            history: RwLock::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            history_limit: history_limit.max(1),
        }
    }

    // --- Alerts ---

    /// Validate and insert a new alert
    pub fn create(&self, input: NewAlert) -> Result<Alert> {
        let draft = AlertDraft::try_from(input)?;
        Ok(self.insert(draft))
    }

    /// Insert an already validated alert
    pub fn insert(&self, draft: AlertDraft) -> Alert {
        let mut alerts = self.alerts.write();
        // allocated under the write lock so `load` cannot hand out the same id
        let id = AlertId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let alert = Alert {
            id,
            owner_id: draft.owner_id,
            symbol: draft.symbol,
            threshold: draft.threshold,
            kind: draft.kind,
            note: draft.note,
            active: true,
            created_at: Utc::now(),
            last_triggered_at: None,
        };
        alerts.insert(id, alert.clone());
        drop(alerts);

        info!(
            alert_id = %alert.id,
            owner_id = %alert.owner_id,
            symbol = %alert.symbol,
            kind = %alert.kind,
            threshold = alert.threshold,
            "Added alert"
        );
        alert
    }

    /// Remove an alert owned by `owner_id`; false if missing or not owned
    pub fn remove(&self, id: AlertId, owner_id: &str) -> bool {
        let owner_id = owner_id.trim();
        let mut alerts = self.alerts.write();
        match alerts.get(&id) {
            Some(alert) if alert.owner_id == owner_id => {
                alerts.remove(&id);
                drop(alerts);
                info!(alert_id = %id, owner_id, "Removed alert");
                true
            }
            _ => false,
        }
    }

    /// Get an alert by ID
    pub fn get(&self, id: AlertId) -> Option<Alert> {
        self.alerts.read().get(&id).cloned()
    }

    /// Alerts owned by `owner_id`, in creation order
    pub fn list(&self, owner_id: &str) -> Vec<Alert> {
        let owner_id = owner_id.trim();
        self.alerts
            .read()
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect()
    }

    /// Point-in-time copy of every alert
    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts.read().values().cloned().collect()
    }

    /// Point-in-time copy of active alerts
    pub fn active_snapshot(&self) -> Vec<Alert> {
        self.alerts
            .read()
            .values()
            .filter(|a| a.active)
            .cloned()
            .collect()
    }

    /// Number of alerts
    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    /// Whether the store holds no alerts
    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }

    /// Record a firing unless the alert was removed or paused meanwhile
    pub fn set_triggered(&self, id: AlertId, at: DateTime<Utc>) -> TriggerMark {
        match self.alerts.write().get_mut(&id) {
            Some(alert) if alert.active => {
                alert.last_triggered_at = Some(at);
                TriggerMark::Marked
            }
            Some(_) => TriggerMark::Paused,
            None => TriggerMark::Missing,
        }
    }

    /// Enable or disable evaluation; false if the alert no longer exists
    pub fn set_active(&self, id: AlertId, active: bool) -> bool {
        match self.alerts.write().get_mut(&id) {
            Some(alert) => {
                alert.active = active;
                true
            }
            None => false,
        }
    }

    /// Enable or disable an alert on behalf of its owner
    pub fn set_active_owned(&self, id: AlertId, owner_id: &str, active: bool) -> Option<Alert> {
        let owner_id = owner_id.trim();
        let mut alerts = self.alerts.write();
        let alert = alerts.get_mut(&id).filter(|a| a.owner_id == owner_id)?;
        alert.active = active;
        Some(alert.clone())
    }

    // --- Trigger history ---

    /// Append a trigger event, evicting the oldest beyond the history limit
    pub fn record_trigger(&self, event: TriggerEvent) {
        let mut history = self.history.write();
        history.push_back(event);
        while history.len() > self.history_limit {
            history.pop_front();
        }
    }

    /// Latest `limit` trigger events for `owner_id`, newest first
    pub fn recent_triggers(&self, owner_id: &str, limit: usize) -> Vec<TriggerEvent> {
        let owner_id = owner_id.trim();
        let mut events: Vec<TriggerEvent> = self
            .history
            .read()
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        events.truncate(limit);
        events
    }

    /// Every retained event, oldest first
    pub fn history(&self) -> Vec<TriggerEvent> {
        self.history.read().iter().cloned().collect()
    }

    // --- Persistence ---

    /// Serialize the alert set to JSON.
    ///
    /// The table is cloned under the read lock and serialized after it is
    /// released.
    pub fn dump(&self) -> Result<String> {
        let snapshot = StoreSnapshot {
            saved_at: Utc::now(),
            alerts: self.snapshot(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Replace the alert set with a blob produced by [`AlertStore::dump`].
    ///
    /// Returns the number of alerts loaded. Id allocation resumes above the
    /// highest loaded id.
    pub fn load(&self, blob: &str) -> Result<usize> {
        let snapshot: StoreSnapshot = serde_json::from_str(blob)?;

        let mut seen = HashSet::with_capacity(snapshot.alerts.len());
        for alert in &snapshot.alerts {
            if !seen.insert(alert.id) {
                return Err(Error::validation(format!("duplicate alert id {} in snapshot", alert.id)));
            }
        }

        let max_id = snapshot.alerts.iter().map(|a| a.id.0).max().unwrap_or(0);
        let next_id = max_id
            .checked_add(1)
            .ok_or_else(|| Error::validation(format!("alert id {max_id} in snapshot leaves no room for new ids")))?;
        let loaded: BTreeMap<AlertId, Alert> =
            snapshot.alerts.into_iter().map(|a| (a.id, a)).collect();
        let count = loaded.len();

        let mut alerts = self.alerts.write();
        *alerts = loaded;
        self.next_id.fetch_max(next_id, Ordering::Relaxed);
        drop(alerts);

        debug!(count, saved_at = %snapshot.saved_at, "Loaded alert snapshot");
        Ok(count)
    }

    /// Write a snapshot file, replacing it atomically
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let blob = self.dump()?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, blob).await?;
        tokio::fs::rename(&tmp, path).await?;
        info!(path = %path.display(), alerts = self.len(), "Saved alert snapshot");
        Ok(())
    }

    /// Load a snapshot file written by [`AlertStore::save_to`]
    pub async fn load_from(&self, path: &Path) -> Result<usize> {
        let blob = tokio::fs::read_to_string(path).await?;
        let count = self.load(&blob)?;
        info!(path = %path.display(), alerts = count, "Restored alert snapshot");
        Ok(count)
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}
