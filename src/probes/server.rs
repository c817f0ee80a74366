//! Axum HTTP server for the probe endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::controller::ControllerState;
use crate::error::{Error, Result};

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Liveness: the process is up and serving
async fn healthz() -> &'static str {
    "ok"
}

/// Readiness: the controller workers are running
async fn readyz(State(state): State<Arc<ControllerState>>) -> (StatusCode, &'static str) {
    if state.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "controller not ready")
    }
}

/// Metrics endpoint handler
async fn metrics_handler() -> Response {
    use prometheus_client::encoding::text::encode;

    let mut buffer = String::new();
    match encode(&mut buffer, &crate::controller::metrics::REGISTRY) {
        Ok(()) => ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], buffer).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Routes served on the probe address
pub fn router(state: Arc<ControllerState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the probe server until the task is dropped
pub async fn run_server(state: Arc<ControllerState>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;
    info!("Probe server listening on {}", addr);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::{FakeBackend, MemoryStore};

    async fn serve(state: Arc<ControllerState>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn state() -> Arc<ControllerState> {
        Arc::new(ControllerState::new(
            Arc::new(FakeBackend::default()),
            Arc::new(MemoryStore::default()),
        ))
    }

    #[tokio::test]
    async fn test_healthz_is_always_ok() {
        let base = serve(state()).await;

        let resp = reqwest::get(format!("{}/healthz", base)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_readyz_follows_controller_state() {
        let state = state();
        let base = serve(Arc::clone(&state)).await;

        let resp = reqwest::get(format!("{}/readyz", base)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready(true);
        let resp = reqwest::get(format!("{}/readyz", base)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_are_exposed() {
        crate::controller::metrics::record_reconcile("success");
        let base = serve(state()).await;

        let resp = reqwest::get(format!("{}/metrics", base)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let content_type = resp.headers()[reqwest::header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("application/openmetrics-text"));
        let body = resp.text().await.unwrap();
        assert!(body.contains("hub_operator_reconciliations_total"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let base = serve(state()).await;

        let resp = reqwest::get(format!("{}/api/projects", base)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
