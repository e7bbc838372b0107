use super::{
    exchange_access_token, fetch_profile, name_from_email, token_client, url_with_params,
    ProviderEndpoints, TokenClient,
};
use crate::auth::ports::{AuthError, ProviderClient, ProviderIdentity, ProviderKind};
use async_trait::async_trait;
use config::OAuthProviderConfig;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

const APPENGINE_LOGOUT_URL: &str = "https://appengine.google.com/_ah/logout";

impl ProviderEndpoints {
    pub fn google() -> Self {
        Self {
            authorize_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            profile_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            logout_url: "https://accounts.google.com/Logout".to_string(),
        }
    }
}

pub struct GoogleProvider {
    config: OAuthProviderConfig,
    endpoints: ProviderEndpoints,
    client: TokenClient,
    http_client: Client,
}

impl GoogleProvider {
    pub fn new(config: OAuthProviderConfig, http_client: Client) -> Result<Self, AuthError> {
        Self::with_endpoints(config, ProviderEndpoints::google(), http_client)
    }

    pub fn with_endpoints(
        config: OAuthProviderConfig,
        endpoints: ProviderEndpoints,
        http_client: Client,
    ) -> Result<Self, AuthError> {
        let client = token_client(&config, &endpoints.token_url)?;
        Ok(Self {
            config,
            endpoints,
            client,
            http_client,
        })
    }
}

#[async_trait]
impl ProviderClient for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn authorization_url(&self) -> Result<String, AuthError> {
        url_with_params(
            &self.endpoints.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
            ],
        )
    }

    async fn exchange(&self, code: String) -> Result<ProviderIdentity, AuthError> {
        let access_token =
            exchange_access_token(&self.client, &self.http_client, self.kind(), code).await?;

        let user: GoogleUser = fetch_profile(
            &self.http_client,
            self.kind(),
            &self.endpoints.profile_url,
            &access_token,
        )
        .await?;

        let identity = ProviderIdentity {
            provider: ProviderKind::Google,
            name: user
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| name_from_email(user.email.as_deref())),
            provider_user_id: user.id,
            email: user.email,
        };

        info!("Google user authenticated: {}", identity.provider_user_id);
        Ok(identity)
    }

    fn logout_url(&self, continue_to: Option<String>) -> Result<String, AuthError> {
        let continue_to = continue_to.unwrap_or_else(|| self.config.redirect_uri.clone());
        // Google signs out first, then hops through appengine to reach our URL
        let appengine = url_with_params(APPENGINE_LOGOUT_URL, &[("continue", &continue_to)])?;
        url_with_params(&self.endpoints.logout_url, &[("continue", &appengine)])
    }
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    #[serde(alias = "sub")]
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}
