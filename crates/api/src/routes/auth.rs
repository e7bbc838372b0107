use crate::{
    conversions::{auth_error_response, ApiError},
    middleware::auth::session_token,
    models::{CallbackRequest, CallbackResponse, ErrorResponse},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use services::auth::{
    AuthError, AuthServiceTrait, CookiePolicy, ProviderKind, SameSitePolicy, SessionDescriptor,
};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct AuthRouteState {
    pub auth_service: Arc<dyn AuthServiceTrait>,
    pub cookie: CookiePolicy,
}

fn parse_provider(provider: &str) -> Result<ProviderKind, ApiError> {
    provider.parse().map_err(auth_error_response)
}

fn found(url: String) -> impl IntoResponse {
    (StatusCode::FOUND, [(LOCATION, url)])
}

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    }
}

fn expires_at(at: DateTime<Utc>) -> Result<time::OffsetDateTime, AuthError> {
    time::OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| AuthError::InternalError(format!("Invalid session expiry: {e}")))
}

/// Build the `Set-Cookie` value for a freshly issued session
pub fn session_cookie(session: &SessionDescriptor) -> Result<Cookie<'static>, AuthError> {
    let policy = &session.cookie;
    Ok(Cookie::build((policy.name.clone(), session.token.0.clone()))
        .path(policy.path.clone())
        .secure(policy.secure)
        .http_only(policy.http_only)
        .same_site(same_site(policy.same_site))
        .expires(expires_at(session.expires_at)?)
        .build())
}

/// Cookie that clears the session cookie when passed to `CookieJar::remove`
pub fn removal_cookie(policy: &CookiePolicy) -> Cookie<'static> {
    Cookie::build((policy.name.clone(), ""))
        .path(policy.path.clone())
        .secure(policy.secure)
        .http_only(policy.http_only)
        .same_site(same_site(policy.same_site))
        .build()
}

/// Start the OAuth flow
///
/// Redirects the browser to the provider's authorization page.
#[utoipa::path(
    get,
    path = "/auth/{provider}/login",
    params(("provider" = String, Path, description = "Provider name: google or kakao")),
    responses(
        (status = 302, description = "Redirect to the provider authorization URL"),
        (status = 404, description = "Unknown or unconfigured provider", body = ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AuthRouteState>,
    Path(provider): Path<String>,
) -> Result<Response, ApiError> {
    let provider = parse_provider(&provider)?;
    debug!("Initiating {} OAuth flow", provider);

    let url = state
        .auth_service
        .authorization_url(provider)
        .map_err(auth_error_response)?;

    Ok(found(url).into_response())
}

/// Complete the OAuth flow
///
/// Exchanges the authorization code, registers the user on first sight and
/// sets the session cookie.
#[utoipa::path(
    post,
    path = "/auth/{provider}/callback",
    params(("provider" = String, Path, description = "Provider name: google or kakao")),
    request_body = CallbackRequest,
    responses(
        (status = 200, description = "Session issued", body = CallbackResponse),
        (status = 400, description = "Missing code or malformed body", body = ErrorResponse),
        (status = 404, description = "Unknown or unconfigured provider", body = ErrorResponse),
        (status = 502, description = "Provider rejected the code or did not answer", body = ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn callback(
    State(state): State<AuthRouteState>,
    Path(provider): Path<String>,
    jar: CookieJar,
    payload: Result<Json<CallbackRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<CallbackResponse>), ApiError> {
    let provider = parse_provider(&provider)?;

    let Json(request) = payload.map_err(|rejection| {
        debug!("Rejected callback body: {}", rejection.body_text());
        auth_error_response(AuthError::InvalidRequest(
            "Request body must be JSON with a code field".to_string(),
        ))
    })?;

    info!("Processing {} OAuth callback", provider);

    let existing = session_token(&jar, &state.cookie.name);
    let outcome = state
        .auth_service
        .handle_callback(provider, request.code, existing)
        .await
        .map_err(auth_error_response)?;

    let cookie = session_cookie(&outcome.session).map_err(auth_error_response)?;

    Ok((
        jar.add(cookie),
        Json(CallbackResponse {
            message: outcome.action.message().to_string(),
            action_type: outcome.action.as_str().to_string(),
            name: outcome.display_name,
        }),
    ))
}

/// Log out
///
/// Invalidates the session, clears the cookie and redirects to the
/// provider's logout page.
#[utoipa::path(
    get,
    path = "/auth/{provider}/logout",
    params(("provider" = String, Path, description = "Provider name: google or kakao")),
    responses(
        (status = 302, description = "Session invalidated, redirect to the provider logout URL"),
        (status = 401, description = "Invalid or missing session", body = ErrorResponse),
        (status = 404, description = "Unknown or unconfigured provider", body = ErrorResponse),
    ),
    security(("session_cookie" = [])),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AuthRouteState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let provider = parse_provider(&provider)?;
    let token = session_token(&jar, &state.cookie.name);

    let url = state
        .auth_service
        .logout(provider, token)
        .await
        .map_err(auth_error_response)?;

    Ok((jar.remove(removal_cookie(&state.cookie)), found(url)).into_response())
}
