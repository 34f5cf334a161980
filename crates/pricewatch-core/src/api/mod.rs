//! REST API implementation
//!
//! This module provides the HTTP command surface for PriceWatch.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::engine::AlertEngine;
use crate::error::{Error, Result};

/// HTTP API server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(engine: Arc<AlertEngine>) -> Self {
        Self {
            state: AppState { engine },
        }
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve(self, addr: &str, shutdown: CancellationToken) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = create_router(self.state)
            .layer(TraceLayer::new_for_http())
            .layer(cors);

        let listener = TcpListener::bind(addr).await?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::AlertStore;
    use crate::market::testing::StubPriceSource;
    use crate::market::UpstreamError;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use axum::Router;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<StubPriceSource>) {
        let prices = Arc::new(StubPriceSource::new());
        prices.set_price("AAPL", 151.0);
        let engine = AlertEngine::new(Arc::new(AlertStore::new()), prices.clone(), true);
        (create_router(AppState { engine: Arc::new(engine) }), prices)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let res = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["alerts"], 0);
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let (app, _) = app();

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/v1/alerts",
            Some(json!({ "owner_id": "u1", "symbol": "aapl", "threshold": "150", "kind": "above" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["alert"]["symbol"], "AAPL");
        assert_eq!(created["alert"]["threshold"], 150.0);
        assert_eq!(created["quote"]["price"], 151.0);
        let id = created["alert"]["id"].as_u64().unwrap();

        let (status, list) = send(&app, Method::GET, "/api/v1/alerts?owner=u1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["count"], 1);

        let (_, other) = send(&app, Method::GET, "/api/v1/alerts?owner=u2", None).await;
        assert_eq!(other["count"], 0);

        let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/alerts/{id}?owner=u2"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/alerts/{id}?owner=u1"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_create_validation_errors() {
        let (app, _) = app();

        for body in [
            json!({ "owner_id": "u1", "symbol": "AAPL", "threshold": 150.0, "kind": "sideways" }),
            json!({ "owner_id": "u1", "symbol": "AAPL", "threshold": "lots", "kind": "above" }),
            json!({ "owner_id": "u1", "symbol": "", "threshold": 150.0, "kind": "above" }),
            json!({ "owner_id": "u1", "symbol": "NOPE", "threshold": 150.0, "kind": "above" }),
        ] {
            let (status, err) = send(&app, Method::POST, "/api/v1/alerts", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(err["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_pause_resume_and_summary() {
        let (app, _) = app();
        let (_, created) = send(
            &app,
            Method::POST,
            "/api/v1/alerts",
            Some(json!({ "owner_id": "u1", "symbol": "AAPL", "threshold": 150.0, "kind": "above" })),
        )
        .await;
        let id = created["alert"]["id"].as_u64().unwrap();

        let (status, paused) = send(&app, Method::POST, &format!("/api/v1/alerts/{id}/pause?owner=u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(paused["active"], false);

        let (_, summary) = send(&app, Method::GET, "/api/v1/alerts/summary?owner=u1", None).await;
        assert_eq!(summary["total_count"], 1);
        assert_eq!(summary["active_count"], 0);
        assert_eq!(summary["by_symbol"]["AAPL"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::POST, &format!("/api/v1/alerts/{id}/resume?owner=u2"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::POST, "/api/v1/alerts/abc/resume?owner=u1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_market_status() {
        let (app, prices) = app();

        let (status, body) = send(&app, Method::GET, "/api/v1/market/status", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["crypto_market_open"], true);
        assert!(body["us_market_open"].is_boolean());
        assert!(body["ihsg_market_open"].is_boolean());
        assert!(body["as_of"].is_string());
        assert_eq!(prices.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_quote_lookup() {
        let (app, prices) = app();
        prices.fail("MSFT", UpstreamError::Http("timed out".to_string()));

        let (status, quote) = send(&app, Method::GET, "/api/v1/quotes/aapl", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(quote["price"], 151.0);

        let (status, _) = send(&app, Method::GET, "/api/v1/quotes/MSFT", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
