use axum::{extract::State, http::StatusCode, response::Json as ResponseJson};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Login providers this instance has credentials for
    pub providers: Vec<String>,
}

/// Providers reported by the health endpoint
#[derive(Clone, Default)]
pub struct HealthState {
    pub providers: Arc<Vec<String>>,
}

/// Health check endpoint
///
/// Returns the health status of the service.
/// Requires no session and is suitable for load balancer probes.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "Health"
)]
pub async fn health_check(
    State(state): State<HealthState>,
) -> (StatusCode, ResponseJson<HealthResponse>) {
    (
        StatusCode::OK,
        ResponseJson(HealthResponse {
            status: "ok".to_string(),
            version: option_env!("CARGO_PKG_VERSION").map(|v| v.to_string()),
            providers: state.providers.as_ref().clone(),
        }),
    )
}
