use crate::models::*;
use crate::routes::health::HealthResponse;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dangil API",
        description = "Social login for the Dangil frontend.\n\n## Authentication\n\nThe frontend sends the browser to `/auth/{provider}/login`, receives the provider's authorization code on its redirect page and posts it to `/auth/{provider}/callback`. The response sets a `session_id` cookie that authenticates every session-gated endpoint.",
        version = "1.0.0",
        license(
            name = "MIT",
        )
    ),
    paths(
        // Auth endpoints
        crate::routes::auth::login,
        crate::routes::auth::callback,
        crate::routes::auth::logout,
        // User endpoints
        crate::routes::users::current_user,
        // Health
        crate::routes::health::health_check,
    ),
    components(
        schemas(
            CallbackRequest, CallbackResponse, UserResponse,
            ErrorResponse, ErrorDetail, HealthResponse,
        ),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security configuration for OpenAPI
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            // Session cookie set by the callback endpoint
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("session_id"))),
            );
        }
    }
}
