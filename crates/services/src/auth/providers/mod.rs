pub mod google;
pub mod kakao;

pub use google::GoogleProvider;
pub use kakao::KakaoProvider;

use super::ports::{AuthError, ProviderClient, ProviderKind};
use config::{AuthConfig, OAuthProviderConfig};
use oauth2::{
    basic::BasicClient, AuthType, AuthorizationCode, ClientId, ClientSecret, RedirectUrl,
    TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{debug, info};

// Type alias for an OAuth client that only performs the code exchange
type TokenClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointSet,
>;

/// Provider endpoints. Overridable so clients can be pointed at a fake server.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub logout_url: String,
}

/// Configured providers, keyed by kind
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn ProviderClient>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Build a client for every provider present in the configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let http_client = http_client(Duration::from_secs(config.provider_timeout_secs))?;
        let mut registry = Self::new();

        if let Some(google) = config.google.clone() {
            registry = registry.with(Arc::new(GoogleProvider::new(
                google.into(),
                http_client.clone(),
            )?));
            info!("Google OAuth configured");
        }
        if let Some(kakao) = config.kakao.clone() {
            registry = registry.with(Arc::new(KakaoProvider::new(
                kakao.into(),
                http_client.clone(),
            )?));
            info!("Kakao OAuth configured");
        }

        Ok(registry)
    }

    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderClient>, AuthError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AuthError::ProviderNotFound(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.providers.contains_key(kind))
            .collect()
    }
}

/// HTTP client shared by all providers. Redirects are not followed, so a
/// misbehaving token endpoint cannot bounce the code to another host.
pub fn http_client(timeout: Duration) -> Result<Client, AuthError> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| AuthError::ConfigError(format!("Failed to build HTTP client: {e}")))
}

fn token_client(
    config: &OAuthProviderConfig,
    token_url: &str,
) -> Result<TokenClient, AuthError> {
    let token_url = TokenUrl::new(token_url.to_string())
        .map_err(|e| AuthError::ConfigError(format!("Invalid token URL: {e}")))?;
    let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
        .map_err(|e| AuthError::ConfigError(format!("Invalid redirect URL: {e}")))?;

    let mut client = BasicClient::new(ClientId::new(config.client_id.clone()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url);

    if let Some(secret) = &config.client_secret {
        client = client.set_client_secret(ClientSecret::new(secret.clone()));
    }

    Ok(client)
}

async fn exchange_access_token(
    client: &TokenClient,
    http_client: &Client,
    provider: ProviderKind,
    code: String,
) -> Result<String, AuthError> {
    debug!("Exchanging {} code for token", provider);

    let token = client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(http_client)
        .await
        .map_err(|e| AuthError::UpstreamAuthFailure(format!("Token exchange failed: {e}")))?;

    Ok(token.access_token().secret().to_string())
}

async fn fetch_profile<T: DeserializeOwned>(
    http_client: &Client,
    provider: ProviderKind,
    profile_url: &str,
    access_token: &str,
) -> Result<T, AuthError> {
    let response = http_client
        .get(profile_url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| {
            AuthError::UpstreamAuthFailure(format!("Failed to fetch {provider} user: {e}"))
        })?;

    let status = response.status();
    debug!("{} profile response status: {}", provider, status);

    if !status.is_success() {
        let response_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());
        return Err(AuthError::UpstreamAuthFailure(format!(
            "{provider} API returned status: {status}, body: {response_text}"
        )));
    }

    response.json().await.map_err(|e| {
        AuthError::UpstreamAuthFailure(format!("Failed to parse {provider} user: {e}"))
    })
}

fn url_with_params(base: &str, params: &[(&str, &str)]) -> Result<String, AuthError> {
    url::Url::parse_with_params(base, params)
        .map(|url| url.to_string())
        .map_err(|e| AuthError::ConfigError(format!("Invalid provider URL {base}: {e}")))
}

/// Fallback display name when the provider withholds one
fn name_from_email(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split('@').next())
        .filter(|local| !local.is_empty())
        .unwrap_or("user")
        .to_string()
}
