//! API handlers for the HTTP REST API

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::engine::{AlertEngine, CreatedAlert};
use crate::error::{Error, Result};
use crate::models::{Alert, AlertId, AlertSummary, MarketStatus, NewAlert, Quote};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AlertEngine>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub alerts: usize,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        alerts: state.engine.store().len(),
    })
}

/// Threshold as sent by clients: a JSON number or a numeric string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ThresholdInput {
    Number(f64),
    Text(String),
}

impl ThresholdInput {
    fn parse(self) -> Result<f64> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::InvalidThreshold(format!("'{s}' is not a number"))),
        }
    }
}

/// Alert creation request
#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    pub owner_id: String,
    pub symbol: String,
    pub threshold: ThresholdInput,
    pub kind: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Create an alert
pub async fn create_alert(
    State(state): State<AppState>,
    Json(req): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<CreatedAlert>)> {
    let input = NewAlert::new(req.owner_id, req.symbol, req.threshold.parse()?, req.kind, req.note);
    let created = state.engine.create_alert(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Owner scope for alert queries
#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner: String,
}

/// Alert list response
#[derive(Serialize)]
pub struct ListAlertsResponse {
    pub alerts: Vec<Alert>,
    pub count: usize,
}

/// List an owner's alerts
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Json<ListAlertsResponse> {
    let alerts = state.engine.list_alerts(&query.owner);
    Json(ListAlertsResponse {
        count: alerts.len(),
        alerts,
    })
}

/// Summary of an owner's alerts
pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Json<AlertSummary> {
    Json(state.engine.summary(&query.owner))
}

/// Delete an alert
pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<StatusCode> {
    let id: AlertId = id.parse()?;
    if state.engine.remove_alert(id, &query.owner) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Alert", id.to_string()))
    }
}

/// Pause an alert
pub async fn pause_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Alert>> {
    let alert = state.engine.set_active(id.parse()?, &query.owner, false)?;
    Ok(Json(alert))
}

/// Resume a paused alert
pub async fn resume_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Alert>> {
    let alert = state.engine.set_active(id.parse()?, &query.owner, true)?;
    Ok(Json(alert))
}

/// Trading session status of the tracked markets
pub async fn market_status(State(state): State<AppState>) -> Json<MarketStatus> {
    Json(state.engine.market_status(chrono::Utc::now()))
}

/// Current quote for a symbol
pub async fn get_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Quote>> {
    Ok(Json(state.engine.quote(&symbol).await?))
}
