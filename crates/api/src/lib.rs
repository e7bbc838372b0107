pub mod conversions;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;

use crate::{
    middleware::{auth_middleware, AuthState},
    openapi::ApiDoc,
    routes::{
        auth::{callback, login, logout, AuthRouteState},
        health::{health_check, HealthState},
        users::current_user,
    },
};
use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use config::{ApiConfig, CorsConfig};
use database::{
    repositories::{SessionRepository, UserRepository},
    Database,
};
use services::auth::{AuthError, AuthService, AuthServiceTrait, CookiePolicy, ProviderRegistry};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

/// Service initialization components
#[derive(Clone)]
pub struct AuthComponents {
    pub auth_service: Arc<dyn AuthServiceTrait>,
    pub cookie: CookiePolicy,
    pub providers: Vec<String>,
    pub auth_state_middleware: AuthState,
}

/// Initialize database connection and run migrations
pub async fn init_database(db_config: &config::DatabaseConfig) -> anyhow::Result<Arc<Database>> {
    let database = Arc::new(
        Database::from_config(db_config)
            .await
            .context("Failed to connect to database")?,
    );

    // Run database migrations
    tracing::info!("Starting database migrations...");
    database
        .run_migrations()
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations completed.");

    match database.sessions.cleanup_expired().await {
        Ok(removed) => tracing::info!("Removed {} expired sessions", removed),
        Err(e) => tracing::warn!("Failed to clean up expired sessions: {e}"),
    }

    Ok(database)
}

/// Initialize authentication services backed by Postgres
pub fn init_auth_services(
    database: Arc<Database>,
    config: &ApiConfig,
) -> Result<AuthComponents, AuthError> {
    // Create repository instances
    let user_repository = Arc::new(UserRepository::new(database.pool().clone()))
        as Arc<dyn services::auth::UserRepository>;
    let session_repository = Arc::new(SessionRepository::new(database.pool().clone()))
        as Arc<dyn services::auth::SessionRepository>;

    tracing::info!("Setting up OAuth providers");
    let providers = ProviderRegistry::from_config(&config.auth)?;
    if providers.kinds().is_empty() {
        tracing::warn!("No OAuth provider configured, every login will be rejected");
    }

    Ok(init_auth_services_with(
        providers,
        user_repository,
        session_repository,
        config,
    ))
}

/// Wire the auth service from explicit parts
pub fn init_auth_services_with(
    providers: ProviderRegistry,
    user_repository: Arc<dyn services::auth::UserRepository>,
    session_repository: Arc<dyn services::auth::SessionRepository>,
    config: &ApiConfig,
) -> AuthComponents {
    let provider_names = providers
        .kinds()
        .into_iter()
        .map(|kind| kind.to_string())
        .collect();

    let auth_service: Arc<dyn AuthServiceTrait> = Arc::new(AuthService::new(
        providers,
        user_repository,
        session_repository,
        &config.auth,
    ));

    let auth_state_middleware =
        AuthState::new(auth_service.clone(), config.auth.cookie.name.clone());

    AuthComponents {
        auth_service,
        cookie: config.auth.cookie.clone(),
        providers: provider_names,
        auth_state_middleware,
    }
}

/// Build the complete application router
pub fn build_app(auth_components: AuthComponents, config: &ApiConfig) -> Router {
    let auth_routes = build_auth_routes(
        auth_components.auth_service.clone(),
        auth_components.cookie.clone(),
    );
    let user_routes = build_user_routes(&auth_components.auth_state_middleware);
    let health_routes = build_health_routes(auth_components.providers);

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .merge(health_routes)
        .merge(build_openapi_routes())
        .layer(build_cors_layer(&config.cors))
}

/// Build authentication routes
pub fn build_auth_routes(auth_service: Arc<dyn AuthServiceTrait>, cookie: CookiePolicy) -> Router {
    let auth_state = AuthRouteState {
        auth_service,
        cookie,
    };

    Router::new()
        .route("/{provider}/login", get(login))
        .route("/{provider}/callback", post(callback))
        .route("/{provider}/logout", get(logout))
        .with_state(auth_state)
}

/// Build session-gated user routes
pub fn build_user_routes(auth_state_middleware: &AuthState) -> Router {
    Router::new()
        .route("/me", get(current_user))
        .layer(from_fn_with_state(
            auth_state_middleware.clone(),
            auth_middleware,
        ))
}

pub fn build_health_routes(providers: Vec<String>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(HealthState {
            providers: Arc::new(providers),
        })
}

/// Build OpenAPI documentation routes
pub fn build_openapi_routes() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    )
}

/// CORS for the browser frontend. Credentials are allowed so the session
/// cookie travels on cross-origin requests, which rules out wildcard origins.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
