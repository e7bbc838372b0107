use api::{build_app, init_auth_services, init_database};
use config::{ApiConfig, LoggingConfig};

#[tokio::main]
async fn main() {
    // Pick up a local .env before reading configuration
    let _ = dotenvy::dotenv();

    // Load configuration first to get logging settings
    let config = ApiConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Application cannot start without a valid configuration.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    let database = init_database(&config.database).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to initialize database");
        std::process::exit(1);
    });

    let auth_components = init_auth_services(database, &config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to initialize authentication");
        std::process::exit(1);
    });
    let providers = auth_components.providers.clone();

    let app = build_app(auth_components, &config);

    let bind_address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(address = %bind_address, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    tracing::info!(address = %bind_address, "Server started successfully");
    tracing::info!("Configured providers: {}", providers.join(", "));
    tracing::info!("Auth Endpoints:");
    tracing::info!("  - GET  /auth/{{provider}}/login (Redirect to provider)");
    tracing::info!("  - POST /auth/{{provider}}/callback (Exchange code, set session cookie)");
    tracing::info!("  - GET  /auth/{{provider}}/logout (Invalidate session)");
    tracing::info!("  - GET  /users/me (Current user)");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server terminated");
        std::process::exit(1);
    }
}

fn init_tracing(logging_config: &LoggingConfig) {
    let filter = logging_config.filter_directive();

    // Initialize tracing based on the format specified in config
    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}
