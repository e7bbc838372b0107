use crate::models::ErrorResponse;
use axum::{http::StatusCode, Json};
use services::auth::AuthError;
use tracing::{error, warn};

pub type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Domain to HTTP Conversions
// ============================================================================

/// Map a service error onto its status code and error body.
/// Upstream and internal details are logged, never echoed to the client.
pub fn auth_error_response(err: AuthError) -> ApiError {
    let (status, body) = match &err {
        AuthError::InvalidRequest(message) => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new(message.clone(), "invalid_request".to_string()),
        ),
        AuthError::UpstreamAuthFailure(detail) => {
            warn!("Upstream authentication failed: {}", detail);
            (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::new(
                    "Authentication with the provider failed".to_string(),
                    "upstream_auth_failure".to_string(),
                ),
            )
        }
        AuthError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            ErrorResponse::new(
                "Invalid or missing session".to_string(),
                "unauthorized".to_string(),
            ),
        ),
        AuthError::ProviderNotFound(provider) => (
            StatusCode::NOT_FOUND,
            ErrorResponse::with_param(
                format!("Unknown or unconfigured provider: {provider}"),
                "provider_not_found".to_string(),
                "provider".to_string(),
            ),
        ),
        AuthError::ConfigError(detail) | AuthError::InternalError(detail) => {
            error!("Auth request failed: {}", detail);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(
                    "Internal server error".to_string(),
                    "internal_server_error".to_string(),
                ),
            )
        }
    };

    (status, Json(body))
}
