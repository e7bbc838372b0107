use crate::conversions::{auth_error_response, ApiError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use services::auth::{AuthError, AuthServiceTrait, SessionToken, User};
use std::sync::Arc;
use tracing::debug;

/// Authenticated user information passed to route handlers
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub User);

/// State for authentication middleware
#[derive(Clone)]
pub struct AuthState {
    pub auth_service: Arc<dyn AuthServiceTrait>,
    pub cookie_name: String,
}

impl AuthState {
    pub fn new(auth_service: Arc<dyn AuthServiceTrait>, cookie_name: String) -> Self {
        Self {
            auth_service,
            cookie_name,
        }
    }

    /// Session token carried by the request's session cookie, if any
    pub fn session_token(&self, jar: &CookieJar) -> Option<SessionToken> {
        session_token(jar, &self.cookie_name)
    }
}

pub fn session_token(jar: &CookieJar, cookie_name: &str) -> Option<SessionToken> {
    jar.get(cookie_name)
        .map(|cookie| cookie.value().trim())
        .filter(|value| !value.is_empty())
        .map(|value| SessionToken(value.to_string()))
}

/// Session cookie middleware. Rejects the request with 401 unless the
/// cookie resolves to a live session.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = state.session_token(&jar) else {
        debug!("Request without {} cookie", state.cookie_name);
        return Err(auth_error_response(AuthError::Unauthorized));
    };

    let user = state
        .auth_service
        .authenticate(token)
        .await
        .map_err(auth_error_response)?;

    debug!("Authenticated user: {}", user.id);
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}
