use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bouncer_common::error::{ExporterError, Result};
use bouncer_store::StatsStore;
use serde::Serialize;
use tracing::warn;

use crate::router::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match check_store(state.store.as_ref(), state.store_timeout).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                error: None,
            }),
        ),
        Err(err) => {
            warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    error: Some(err.to_string()),
                }),
            )
        }
    }
}

/// Runs `StatsStore::check` under `timeout`.
pub async fn check_store(store: &dyn StatsStore, timeout: std::time::Duration) -> Result<()> {
    tokio::time::timeout(timeout, store.check())
        .await
        .map_err(|_| ExporterError::Timeout(timeout))?
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}
