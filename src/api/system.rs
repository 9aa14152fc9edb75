//! Health API handler.
//!
//! # Purpose and responsibility
//! Provides a lightweight health endpoint for probes and operators.
//!
//! # Key invariants and assumptions
//! - Health checks must be fast and side-effect free.
//! - The report lists each dependency under `info` (healthy) or `error`
//!   (failing), and always under `details`.
use crate::api::types::{ComponentHealth, HealthResponse};
use crate::app::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::collections::BTreeMap;

#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "system",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "A dependency is down", body = HealthResponse)
    )
)]
/// Return the service health report.
///
/// Probes the backing store; the HTTP status mirrors the overall verdict so
/// load balancers can act on it without parsing the body.
pub(crate) async fn health(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let mut info = BTreeMap::new();
    let mut error = BTreeMap::new();

    let database = match state.store.health_check().await {
        Ok(()) => {
            let up = ComponentHealth {
                status: "up".to_string(),
                message: None,
            };
            info.insert("database".to_string(), up.clone());
            up
        }
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            let down = ComponentHealth {
                status: "down".to_string(),
                message: Some(err.to_string()),
            };
            error.insert("database".to_string(), down.clone());
            down
        }
    };

    let mut details = BTreeMap::new();
    details.insert("database".to_string(), database);

    let healthy = error.is_empty();
    let response = HealthResponse {
        status: if healthy { "ok" } else { "error" }.to_string(),
        info,
        error,
        details,
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}
