//! API routes

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Alerts
        .route("/api/v1/alerts", post(handlers::create_alert))
        .route("/api/v1/alerts", get(handlers::list_alerts))
        .route("/api/v1/alerts/summary", get(handlers::get_summary))
        .route("/api/v1/alerts/:id", delete(handlers::delete_alert))
        .route("/api/v1/alerts/:id/pause", post(handlers::pause_alert))
        .route("/api/v1/alerts/:id/resume", post(handlers::resume_alert))

        // Quotes
        .route("/api/v1/quotes/:symbol", get(handlers::get_quote))
        .route("/api/v1/market/status", get(handlers::market_status))

        .with_state(state)
}
