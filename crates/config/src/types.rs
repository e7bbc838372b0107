use serde::Deserialize;
use std::{collections::HashMap, env};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            cors: CorsConfig::from_env()?,
        })
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: usize,
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("DATABASE_HOST").map_err(|_| "DATABASE_HOST not set")?,
            port: env::var("DATABASE_PORT")
                .map_err(|_| "DATABASE_PORT not set")?
                .parse()
                .map_err(|_| "DATABASE_PORT must be a valid port number")?,
            database: env::var("DATABASE_NAME").map_err(|_| "DATABASE_NAME not set")?,
            username: env::var("DATABASE_USERNAME").map_err(|_| "DATABASE_USERNAME not set")?,
            password: env::var("DATABASE_PASSWORD").map_err(|_| "DATABASE_PASSWORD not set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| "DATABASE_MAX_CONNECTIONS must be a valid number")?,
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "dangil".to_string(),
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| "SERVER_PORT must be a valid port number")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Logging Configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub modules: HashMap<String, String>,
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let mut modules = HashMap::new();

        // Load module-specific log levels
        if let Ok(level) = env::var("LOG_MODULE_API") {
            modules.insert("api".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_SERVICES") {
            modules.insert("services".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_DATABASE") {
            modules.insert("database".to_string(), level);
        }

        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            modules,
        })
    }

    /// Filter directive understood by `tracing_subscriber::EnvFilter`
    pub fn filter_directive(&self) -> String {
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();

        let mut filter = self.level.clone();
        for (module, level) in modules {
            filter.push_str(&format!(",{module}={level}"));
        }
        filter
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut modules = HashMap::new();
        modules.insert("api".to_string(), "debug".to_string());
        modules.insert("services".to_string(), "debug".to_string());

        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            modules,
        }
    }
}

/// Cross-origin settings for the browser frontend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(match env::var("CORS_ALLOWED_ORIGINS") {
            Ok(origins) => Self {
                allowed_origins: split_list(&origins),
            },
            Err(_) => Self::default(),
        })
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl std::str::FromStr for SameSitePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => Err(format!("unknown SameSite policy: {other}")),
        }
    }
}

/// Attributes applied to the session cookie.
///
/// The defaults reproduce the frontend contract: the cookie is sent
/// cross-site, only over TLS, and stays readable from client-side script.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSitePolicy,
    pub path: String,
}

impl CookieConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();
        Ok(Self {
            name: env::var("AUTH_COOKIE_NAME").unwrap_or(defaults.name),
            secure: parse_env_or("AUTH_COOKIE_SECURE", defaults.secure)?,
            http_only: parse_env_or("AUTH_COOKIE_HTTP_ONLY", defaults.http_only)?,
            same_site: parse_env_or("AUTH_COOKIE_SAME_SITE", defaults.same_site)?,
            path: env::var("AUTH_COOKIE_PATH").unwrap_or(defaults.path),
        })
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "session_id".to_string(),
            secure: true,
            http_only: false,
            same_site: SameSitePolicy::None,
            path: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub google: Option<GoogleOAuthConfig>,
    pub kakao: Option<KakaoOAuthConfig>,
    /// Lifetime of an issued session
    pub session_lifetime_hours: i64,
    /// Upper bound for a full code exchange against a provider
    pub provider_timeout_secs: u64,
    /// Where the provider sends the browser after logout.
    /// Falls back to the provider's redirect URL when unset.
    pub logout_redirect_url: Option<String>,
    pub cookie: CookieConfig,
}

impl AuthConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let google = if let (Ok(client_id), Ok(client_secret), Ok(redirect_url)) = (
            env::var("GOOGLE_CLIENT_ID"),
            env::var("GOOGLE_CLIENT_SECRET"),
            env::var("GOOGLE_REDIRECT_URL"),
        ) {
            Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                redirect_url,
            })
        } else {
            None
        };

        // Kakao client secrets are optional on the provider side
        let kakao = if let (Ok(client_id), Ok(redirect_url)) =
            (env::var("KAKAO_CLIENT_ID"), env::var("KAKAO_REDIRECT_URL"))
        {
            Some(KakaoOAuthConfig {
                client_id,
                client_secret: env::var("KAKAO_CLIENT_SECRET").ok(),
                redirect_url,
            })
        } else {
            None
        };

        let defaults = Self::default();
        Ok(Self {
            google,
            kakao,
            session_lifetime_hours: parse_env_or(
                "AUTH_SESSION_LIFETIME_HOURS",
                defaults.session_lifetime_hours,
            )?,
            provider_timeout_secs: parse_env_or(
                "AUTH_PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout_secs,
            )?,
            logout_redirect_url: env::var("AUTH_LOGOUT_REDIRECT_URL").ok(),
            cookie: CookieConfig::from_env()?,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.session_lifetime_hours <= 0 {
            return Err("session_lifetime_hours must be positive".to_string());
        }
        if self.session_lifetime_hours > MAX_SESSION_LIFETIME_HOURS {
            return Err(format!(
                "session_lifetime_hours must not exceed {MAX_SESSION_LIFETIME_HOURS}"
            ));
        }
        if self.provider_timeout_secs == 0 {
            return Err("provider_timeout_secs must be positive".to_string());
        }
        if self.cookie.same_site == SameSitePolicy::None && !self.cookie.secure {
            return Err("SameSite=None cookies must be secure".to_string());
        }
        Ok(())
    }
}

/// One year
pub const MAX_SESSION_LIFETIME_HOURS: i64 = 24 * 365;

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            google: None,
            kakao: None,
            session_lifetime_hours: 24,
            provider_timeout_secs: 10,
            logout_redirect_url: None,
            cookie: CookieConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KakaoOAuthConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub redirect_url: String,
}

// Generic OAuth provider config for unified handling
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

impl From<GoogleOAuthConfig> for OAuthProviderConfig {
    fn from(config: GoogleOAuthConfig) -> Self {
        Self {
            client_id: config.client_id,
            client_secret: Some(config.client_secret),
            redirect_uri: config.redirect_url,
        }
    }
}

impl From<KakaoOAuthConfig> for OAuthProviderConfig {
    fn from(config: KakaoOAuthConfig) -> Self {
        Self {
            client_id: config.client_id,
            client_secret: config.client_secret,
            redirect_uri: config.redirect_url,
        }
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("{key} has an invalid value: {value}")),
        Err(_) => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
