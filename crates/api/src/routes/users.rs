use crate::{
    middleware::AuthenticatedUser,
    models::{ErrorResponse, UserResponse},
};
use axum::{Extension, Json};
use tracing::debug;

/// Get current user
///
/// Returns the user behind the session cookie.
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Invalid or missing session", body = ErrorResponse),
    ),
    security(("session_cookie" = [])),
    tag = "Users"
)]
pub async fn current_user(Extension(user): Extension<AuthenticatedUser>) -> Json<UserResponse> {
    debug!("Current user requested: {}", user.0.id);
    Json(UserResponse::from(user.0))
}
