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

impl ProviderEndpoints {
    pub fn kakao() -> Self {
        Self {
            authorize_url: "https://kauth.kakao.com/oauth/authorize".to_string(),
            token_url: "https://kauth.kakao.com/oauth/token".to_string(),
            profile_url: "https://kapi.kakao.com/v2/user/me".to_string(),
            logout_url: "https://kauth.kakao.com/oauth/logout".to_string(),
        }
    }
}

pub struct KakaoProvider {
    config: OAuthProviderConfig,
    endpoints: ProviderEndpoints,
    client: TokenClient,
    http_client: Client,
}

impl KakaoProvider {
    pub fn new(config: OAuthProviderConfig, http_client: Client) -> Result<Self, AuthError> {
        Self::with_endpoints(config, ProviderEndpoints::kakao(), http_client)
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
impl ProviderClient for KakaoProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kakao
    }

    fn authorization_url(&self) -> Result<String, AuthError> {
        // Scopes are managed in the Kakao developer console, not per request
        url_with_params(
            &self.endpoints.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
            ],
        )
    }

    async fn exchange(&self, code: String) -> Result<ProviderIdentity, AuthError> {
        let access_token =
            exchange_access_token(&self.client, &self.http_client, self.kind(), code).await?;

        let user: KakaoUser = fetch_profile(
            &self.http_client,
            self.kind(),
            &self.endpoints.profile_url,
            &access_token,
        )
        .await?;

        let identity = user.into_identity();
        info!("Kakao user authenticated: {}", identity.provider_user_id);
        Ok(identity)
    }

    fn logout_url(&self, continue_to: Option<String>) -> Result<String, AuthError> {
        let continue_to = continue_to.unwrap_or_else(|| self.config.redirect_uri.clone());
        url_with_params(
            &self.endpoints.logout_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("logout_redirect_uri", continue_to.as_str()),
            ],
        )
    }
}

#[derive(Debug, Deserialize)]
struct KakaoUser {
    id: i64,
    #[serde(default)]
    kakao_account: Option<KakaoAccount>,
    #[serde(default)]
    properties: Option<KakaoProperties>,
}

#[derive(Debug, Deserialize)]
struct KakaoAccount {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    profile: Option<KakaoProfile>,
}

#[derive(Debug, Deserialize)]
struct KakaoProfile {
    #[serde(default)]
    nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KakaoProperties {
    #[serde(default)]
    nickname: Option<String>,
}

impl KakaoUser {
    fn into_identity(self) -> ProviderIdentity {
        let (email, account_nickname) = match self.kakao_account {
            Some(account) => (account.email, account.profile.and_then(|p| p.nickname)),
            None => (None, None),
        };

        // Older apps only expose the nickname through `properties`
        let name = account_nickname
            .or_else(|| self.properties.and_then(|p| p.nickname))
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| name_from_email(email.as_deref()));

        ProviderIdentity {
            provider: ProviderKind::Kakao,
            provider_user_id: self.id.to_string(),
            name,
            email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::providers::{http_client, test_helpers::provider_config};
    use httpmock::prelude::*;
    use std::time::Duration;

    fn provider_for(server: &MockServer) -> KakaoProvider {
        let endpoints = ProviderEndpoints {
            authorize_url: server.url("/oauth/authorize"),
            token_url: server.url("/oauth/token"),
            profile_url: server.url("/v2/user/me"),
            logout_url: server.url("/oauth/logout"),
        };
        KakaoProvider::with_endpoints(
            provider_config(None),
            endpoints,
            http_client(Duration::from_secs(5)).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_authorization_url_has_no_scope() {
        let provider = KakaoProvider::new(
            provider_config(None),
            http_client(Duration::from_secs(5)).unwrap(),
        )
        .unwrap();

        let url = url::Url::parse(&provider.authorization_url().unwrap()).unwrap();
        assert_eq!(url.host_str(), Some("kauth.kakao.com"));
        assert_eq!(url.path(), "/oauth/authorize");

        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("client_id".to_string(), "test-client".to_string()),
                (
                    "redirect_uri".to_string(),
                    "http://localhost:3000/auth/callback".to_string()
                ),
                ("response_type".to_string(), "code".to_string()),
            ]
        );
    }

    #[test]
    fn test_logout_url() {
        let provider = KakaoProvider::new(
            provider_config(None),
            http_client(Duration::from_secs(5)).unwrap(),
        )
        .unwrap();

        let url = url::Url::parse(
            &provider
                .logout_url(Some("https://app.example.com/bye".to_string()))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(url.path(), "/oauth/logout");

        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".to_string(), "test-client".to_string())));
        assert!(pairs.contains(&(
            "logout_redirect_uri".to_string(),
            "https://app.example.com/bye".to_string()
        )));
    }

    #[test]
    fn test_profile_normalization() {
        let full: KakaoUser = serde_json::from_value(serde_json::json!({
            "id": 123456789,
            "properties": { "nickname": "legacy" },
            "kakao_account": {
                "email": "k@x.com",
                "profile": { "nickname": "Kim" }
            }
        }))
        .unwrap();
        let identity = full.into_identity();
        assert_eq!(identity.provider_user_id, "123456789");
        assert_eq!(identity.name, "Kim");
        assert_eq!(identity.email.as_deref(), Some("k@x.com"));

        let legacy: KakaoUser = serde_json::from_value(serde_json::json!({
            "id": 42,
            "properties": { "nickname": "legacy" }
        }))
        .unwrap();
        let identity = legacy.into_identity();
        assert_eq!(identity.name, "legacy");
        assert!(identity.email.is_none());

        let bare: KakaoUser = serde_json::from_value(serde_json::json!({ "id": 7 })).unwrap();
        assert_eq!(bare.into_identity().name, "user");
    }

    #[tokio::test]
    async fn test_exchange_without_client_secret() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/token")
                    .body_contains("client_id=test-client")
                    .body_contains("code=kakao-code");
                then.status(200).json_body(serde_json::json!({
                    "token_type": "bearer",
                    "access_token": "kakao-access-token",
                    "expires_in": 21599,
                    "refresh_token": "kakao-refresh-token",
                    "refresh_token_expires_in": 5183999
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v2/user/me")
                    .header("authorization", "Bearer kakao-access-token");
                then.status(200).json_body(serde_json::json!({
                    "id": 2024,
                    "kakao_account": { "profile": { "nickname": "Lee" } }
                }));
            })
            .await;

        let identity = provider_for(&server)
            .exchange("kakao-code".to_string())
            .await
            .unwrap();

        token_mock.assert_async().await;
        assert_eq!(identity.provider, ProviderKind::Kakao);
        assert_eq!(identity.provider_user_id, "2024");
        assert_eq!(identity.name, "Lee");
    }

    #[tokio::test]
    async fn test_profile_error_status_is_upstream_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(200).json_body(serde_json::json!({
                    "token_type": "bearer",
                    "access_token": "kakao-access-token"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v2/user/me");
                then.status(401).json_body(serde_json::json!({
                    "msg": "this access token does not exist",
                    "code": -401
                }));
            })
            .await;

        let result = provider_for(&server).exchange("kakao-code".to_string()).await;
        assert!(matches!(result, Err(AuthError::UpstreamAuthFailure(_))));
    }
}
