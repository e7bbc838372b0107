#![allow(dead_code)]

use api::{build_app, init_auth_services_with};
use axum_test::TestServer;
use config::ApiConfig;
use services::auth::{
    test_support::{InMemorySessionRepository, InMemoryUserRepository},
    ProviderClient, ProviderRegistry,
};
use std::sync::Arc;

pub use services::auth::test_support::{identity, StaticProvider};
pub use services::auth::ProviderKind;

pub const SESSION_COOKIE: &str = "session_id";

pub struct TestApp {
    pub server: TestServer,
    pub users: Arc<InMemoryUserRepository>,
    pub sessions: Arc<InMemorySessionRepository>,
}

/// Helper function to create a test configuration
pub fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.auth.provider_timeout_secs = 1;
    config.auth.logout_redirect_url = Some("https://app.example.com/".to_string());
    config.logging.level = "debug".to_string();
    config
}

pub fn setup_test_server(providers: Vec<Arc<dyn ProviderClient>>) -> TestApp {
    setup_test_server_with(providers, InMemoryUserRepository::new(), test_config())
}

pub fn setup_test_server_with(
    providers: Vec<Arc<dyn ProviderClient>>,
    users: InMemoryUserRepository,
    config: ApiConfig,
) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::level_filters::LevelFilter::DEBUG)
        .try_init();

    let registry = providers
        .into_iter()
        .fold(ProviderRegistry::new(), |registry, provider| {
            registry.with(provider)
        });

    let users = Arc::new(users);
    let sessions = Arc::new(InMemorySessionRepository::new());
    let auth_components =
        init_auth_services_with(registry, users.clone(), sessions.clone(), &config);
    let app = build_app(auth_components, &config);

    TestApp {
        server: TestServer::new(app).unwrap(),
        users,
        sessions,
    }
}

pub fn google_alice() -> Arc<StaticProvider> {
    Arc::new(StaticProvider::new(identity(ProviderKind::Google, "g-1", "Alice")))
}

pub fn kakao_kim() -> Arc<StaticProvider> {
    Arc::new(StaticProvider::new(identity(ProviderKind::Kakao, "2024", "Kim")))
}
