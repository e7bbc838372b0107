pub mod identity;
pub mod ports;
pub mod providers;
pub mod session;
#[cfg(any(test, feature = "test-mocks"))]
pub mod test_support;

pub use identity::IdentityResolver;
pub use ports::*;
pub use providers::{ProviderEndpoints, ProviderRegistry};
pub use session::SessionIssuer;

use async_trait::async_trait;
use config::AuthConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct AuthService {
    providers: ProviderRegistry,
    identities: IdentityResolver,
    user_repository: Arc<dyn UserRepository>,
    sessions: SessionIssuer,
    exchange_timeout: Duration,
    logout_redirect_url: Option<String>,
}

impl AuthService {
    pub fn new(
        providers: ProviderRegistry,
        user_repository: Arc<dyn UserRepository>,
        session_repository: Arc<dyn SessionRepository>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            providers,
            identities: IdentityResolver::new(user_repository.clone()),
            user_repository,
            sessions: SessionIssuer::new(
                session_repository,
                config.session_lifetime_hours,
                config.cookie.clone(),
            ),
            exchange_timeout: Duration::from_secs(config.provider_timeout_secs),
            logout_redirect_url: config.logout_redirect_url.clone(),
        }
    }

    pub fn cookie_policy(&self) -> &CookiePolicy {
        self.sessions.cookie_policy()
    }

    async fn exchange(
        &self,
        provider: &dyn ProviderClient,
        code: String,
    ) -> Result<ProviderIdentity, AuthError> {
        let identity = tokio::time::timeout(self.exchange_timeout, provider.exchange(code))
            .await
            .map_err(|_| {
                AuthError::UpstreamAuthFailure(format!(
                    "{} did not answer within {}s",
                    provider.kind(),
                    self.exchange_timeout.as_secs()
                ))
            })?
            .map_err(|e| match e {
                AuthError::UpstreamAuthFailure(_) => e,
                other => AuthError::UpstreamAuthFailure(other.to_string()),
            })?;

        if identity.provider_user_id.trim().is_empty() {
            return Err(AuthError::UpstreamAuthFailure(format!(
                "{} returned an empty user id",
                provider.kind()
            )));
        }

        Ok(identity)
    }

    async fn register(&self, identity: &ProviderIdentity) -> Result<(AuthAction, User), AuthError> {
        let created = self
            .user_repository
            .create_if_absent(NewUser::from(identity))
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to create user: {e}")))?;

        match created {
            CreateUserResult::Created(user) => {
                info!("Registered user {}", user.id);
                Ok((AuthAction::Register, user))
            }
            CreateUserResult::Conflict => {
                // Lost the race against a concurrent registration of the same identity
                debug!("User {} registered concurrently, logging in", identity.user_id());
                let user = self.existing_user(&identity.user_id()).await?;
                Ok((AuthAction::Login, user))
            }
        }
    }

    /// Undo a registration whose first session could not be stored
    async fn discard_registration(&self, user: &User) {
        match self.user_repository.delete_unused(&user.id).await {
            Ok(true) => debug!("Discarded registration of user {}", user.id),
            Ok(false) => warn!("User {} already holds a session, keeping it", user.id),
            Err(e) => warn!("Failed to discard registration of user {}: {e}", user.id),
        }
    }

    async fn existing_user(&self, id: &UserId) -> Result<User, AuthError> {
        self.identities
            .resolve(id)
            .await?
            .ok_or_else(|| AuthError::InternalError(format!("User {id} disappeared")))
    }
}

#[async_trait]
impl AuthServiceTrait for AuthService {
    fn authorization_url(&self, provider: ProviderKind) -> Result<String, AuthError> {
        self.providers.get(provider)?.authorization_url()
    }

    async fn handle_callback(
        &self,
        provider: ProviderKind,
        code: Option<String>,
        existing_session: Option<SessionToken>,
    ) -> Result<CallbackOutcome, AuthError> {
        let client = self.providers.get(provider)?;

        let code = code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::InvalidRequest("Code not found".to_string()))?;

        let identity = self.exchange(client.as_ref(), code).await?;
        let user_id = identity.user_id();

        let (action, user) = if self.identities.exists(&user_id).await? {
            (AuthAction::Login, self.existing_user(&user_id).await?)
        } else {
            self.register(&identity).await?
        };

        let hint = match action {
            AuthAction::Login => existing_session.as_ref(),
            AuthAction::Register => None,
        };
        let session = match self.sessions.issue(&user, hint).await {
            Ok(session) => session,
            Err(e) => {
                if action == AuthAction::Register {
                    self.discard_registration(&user).await;
                }
                return Err(e);
            }
        };

        info!(
            "{} via {} completed for user {}",
            action.as_str(),
            provider,
            user.id
        );

        Ok(CallbackOutcome {
            action,
            user,
            display_name: identity.name,
            session,
        })
    }

    async fn authenticate(&self, token: SessionToken) -> Result<User, AuthError> {
        let session = self
            .sessions
            .resolve(&token)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        self.identities
            .resolve(&session.user_id)
            .await?
            .ok_or(AuthError::Unauthorized)
    }

    async fn logout(
        &self,
        provider: ProviderKind,
        token: Option<SessionToken>,
    ) -> Result<String, AuthError> {
        let client = self.providers.get(provider)?;
        let token = token.ok_or(AuthError::Unauthorized)?;

        let session = self
            .sessions
            .resolve(&token)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if !session.user_id.belongs_to(provider) {
            warn!(
                "Session {} of user {} presented to {} logout",
                session.id, session.user_id, provider
            );
            return Err(AuthError::Unauthorized);
        }

        if !self.sessions.revoke(&session).await? {
            warn!("Session {} was revoked concurrently", session.id);
            return Err(AuthError::Unauthorized);
        }
        info!("Session {} for user {} logged out", session.id, session.user_id);

        client.logout_url(self.logout_redirect_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{
        identity, InMemorySessionRepository, InMemoryUserRepository, StaticProvider,
    };
    use super::*;

    struct Harness {
        service: Arc<AuthService>,
        users: Arc<InMemoryUserRepository>,
        sessions: Arc<InMemorySessionRepository>,
    }

    fn harness_with(
        provider: Arc<dyn ProviderClient>,
        users: InMemoryUserRepository,
        config: AuthConfig,
    ) -> Harness {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let users = Arc::new(users);
        let sessions = Arc::new(InMemorySessionRepository::new());
        let service = Arc::new(AuthService::new(
            ProviderRegistry::new().with(provider),
            users.clone(),
            sessions.clone(),
            &config,
        ));
        Harness {
            service,
            users,
            sessions,
        }
    }

    fn harness(provider: Arc<dyn ProviderClient>) -> Harness {
        harness_with(provider, InMemoryUserRepository::new(), AuthConfig::default())
    }

    fn alice() -> Arc<StaticProvider> {
        Arc::new(StaticProvider::new(identity(
            ProviderKind::Google,
            "g-1",
            "Alice",
        )))
    }

    #[tokio::test]
    async fn test_first_callback_registers() {
        let h = harness(alice());

        let outcome = h
            .service
            .handle_callback(ProviderKind::Google, Some("abc123".to_string()), None)
            .await
            .unwrap();

        assert_eq!(outcome.action, AuthAction::Register);
        assert_eq!(outcome.action.message(), "register process is complete");
        assert_eq!(outcome.display_name, "Alice");
        assert_eq!(outcome.user.id.0, "google:g-1");
        assert_eq!(outcome.user.email.as_deref(), Some("alice@x.com"));
        assert!(outcome.session.expires_at > chrono::Utc::now());
        assert_eq!(h.users.len(), 1);
        assert_eq!(h.sessions.all().len(), 1);
    }

    #[tokio::test]
    async fn test_second_callback_logs_in_same_user() {
        let h = harness(alice());

        let first = h
            .service
            .handle_callback(ProviderKind::Google, Some("abc123".to_string()), None)
            .await
            .unwrap();
        let second = h
            .service
            .handle_callback(ProviderKind::Google, Some("def456".to_string()), None)
            .await
            .unwrap();

        assert_eq!(second.action, AuthAction::Login);
        assert_eq!(second.action.message(), "login process is complete");
        assert_eq!(first.user.id, second.user.id);
        assert_ne!(first.session.token, second.session.token);
        assert_eq!(h.users.len(), 1);
        assert_eq!(h.users.create_calls(), 1);
        assert_eq!(h.sessions.all().len(), 2);
    }

    #[tokio::test]
    async fn test_login_rotates_presented_session() {
        let h = harness(alice());

        let first = h
            .service
            .handle_callback(ProviderKind::Google, Some("abc123".to_string()), None)
            .await
            .unwrap();
        let second = h
            .service
            .handle_callback(
                ProviderKind::Google,
                Some("def456".to_string()),
                Some(first.session.token.clone()),
            )
            .await
            .unwrap();

        assert!(matches!(
            h.service.authenticate(first.session.token).await,
            Err(AuthError::Unauthorized)
        ));
        assert_eq!(
            h.service.authenticate(second.session.token).await.unwrap().id,
            second.user.id
        );
        assert_eq!(h.sessions.all().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_registrations_create_one_user() {
        const N: usize = 8;
        let h = harness_with(
            alice(),
            InMemoryUserRepository::with_create_barrier(N),
            AuthConfig::default(),
        );

        let callbacks = (0..N).map(|i| {
            let service = h.service.clone();
            async move {
                service
                    .handle_callback(ProviderKind::Google, Some(format!("code-{i}")), None)
                    .await
            }
        });
        let outcomes = futures::future::join_all(callbacks).await;

        let outcomes: Vec<_> = outcomes.into_iter().map(|o| o.unwrap()).collect();
        let registers = outcomes
            .iter()
            .filter(|o| o.action == AuthAction::Register)
            .count();

        assert_eq!(registers, 1);
        assert_eq!(h.users.len(), 1);
        assert_eq!(h.users.create_calls(), N);
        assert_eq!(h.sessions.all().len(), N);
        assert!(outcomes.iter().all(|o| o.user.id.0 == "google:g-1"));
    }

    #[tokio::test]
    async fn test_missing_code_is_rejected_before_exchange() {
        let provider = alice();
        let h = harness(provider.clone());

        for code in [None, Some(String::new()), Some("   ".to_string())] {
            let result = h
                .service
                .handle_callback(ProviderKind::Google, code, None)
                .await;
            assert!(matches!(result, Err(AuthError::InvalidRequest(m)) if m == "Code not found"));
        }

        assert_eq!(provider.exchange_calls(), 0);
        assert!(h.users.is_empty());
        assert!(h.sessions.all().is_empty());
    }

    #[tokio::test]
    async fn test_empty_provider_user_id_is_upstream_failure() {
        let mut provider = MockProviderClient::new();
        provider.expect_kind().return_const(ProviderKind::Kakao);
        provider.expect_exchange().times(1).returning(|_| {
            Ok(ProviderIdentity {
                provider: ProviderKind::Kakao,
                provider_user_id: String::new(),
                name: "Kim".to_string(),
                email: None,
            })
        });

        let users = InMemoryUserRepository::new();
        // A lookup would surface as InternalError instead
        users.fail_reads(true);
        let h = harness_with(Arc::new(provider), users, AuthConfig::default());

        let result = h
            .service
            .handle_callback(ProviderKind::Kakao, Some("code".to_string()), None)
            .await;

        assert!(matches!(result, Err(AuthError::UpstreamAuthFailure(_))));
        assert_eq!(h.users.create_calls(), 0);
        assert!(h.sessions.all().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_upstream_failure() {
        let h = harness(Arc::new(StaticProvider::failing(
            ProviderKind::Google,
            "invalid_grant",
        )));

        let result = h
            .service
            .handle_callback(ProviderKind::Google, Some("stale".to_string()), None)
            .await;

        assert!(matches!(result, Err(AuthError::UpstreamAuthFailure(m)) if m == "invalid_grant"));
        assert!(h.users.is_empty());
        assert!(h.sessions.all().is_empty());
    }

    #[tokio::test]
    async fn test_provider_timeout_is_upstream_failure() {
        let provider = Arc::new(
            StaticProvider::new(identity(ProviderKind::Google, "g-1", "Alice"))
                .with_delay(Duration::from_secs(5)),
        );
        let config = AuthConfig {
            provider_timeout_secs: 1,
            ..AuthConfig::default()
        };
        let h = harness_with(provider, InMemoryUserRepository::new(), config);

        let result = h
            .service
            .handle_callback(ProviderKind::Google, Some("abc123".to_string()), None)
            .await;

        assert!(matches!(result, Err(AuthError::UpstreamAuthFailure(_))));
        assert!(h.users.is_empty());
    }

    #[tokio::test]
    async fn test_session_write_failure_is_internal_error() {
        let h = harness(alice());
        h.sessions.fail_writes(true);

        let result = h
            .service
            .handle_callback(ProviderKind::Google, Some("abc123".to_string()), None)
            .await;

        assert!(matches!(result, Err(AuthError::InternalError(_))));
        assert!(h.users.is_empty());
        assert!(h.sessions.all().is_empty());

        // Once the store recovers the identity still registers
        h.sessions.fail_writes(false);
        let outcome = h
            .service
            .handle_callback(ProviderKind::Google, Some("def456".to_string()), None)
            .await
            .unwrap();
        assert_eq!(outcome.action, AuthAction::Register);
        assert_eq!(h.users.len(), 1);
    }

    #[tokio::test]
    async fn test_login_session_failure_keeps_user() {
        let h = harness(alice());
        h.service
            .handle_callback(ProviderKind::Google, Some("abc123".to_string()), None)
            .await
            .unwrap();
        h.sessions.fail_writes(true);

        let result = h
            .service
            .handle_callback(ProviderKind::Google, Some("def456".to_string()), None)
            .await;

        assert!(matches!(result, Err(AuthError::InternalError(_))));
        assert_eq!(h.users.len(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let h = harness(alice());

        assert!(matches!(
            h.service.authorization_url(ProviderKind::Kakao),
            Err(AuthError::ProviderNotFound(_))
        ));
        assert!(matches!(
            h.service
                .handle_callback(ProviderKind::Kakao, Some("abc".to_string()), None)
                .await,
            Err(AuthError::ProviderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let h = harness(alice());
        let outcome = h
            .service
            .handle_callback(ProviderKind::Google, Some("abc123".to_string()), None)
            .await
            .unwrap();
        let token = outcome.session.token;

        assert_eq!(
            h.service.authenticate(token.clone()).await.unwrap().name,
            "Alice"
        );

        let url = h
            .service
            .logout(ProviderKind::Google, Some(token.clone()))
            .await
            .unwrap();
        assert!(url.starts_with("https://google.example.com/logout"));

        assert!(matches!(
            h.service.authenticate(token.clone()).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            h.service.logout(ProviderKind::Google, Some(token)).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_logout_without_session_is_unauthorized() {
        let h = harness(alice());

        assert!(matches!(
            h.service.logout(ProviderKind::Google, None).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            h.service
                .logout(
                    ProviderKind::Google,
                    Some(SessionToken("sess_forged".to_string()))
                )
                .await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_logout_rejects_session_of_other_provider() {
        let kakao = Arc::new(StaticProvider::new(identity(ProviderKind::Kakao, "7", "Kim")));
        let service = AuthService::new(
            ProviderRegistry::new().with(alice()).with(kakao),
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemorySessionRepository::new()),
            &AuthConfig::default(),
        );

        let outcome = service
            .handle_callback(ProviderKind::Kakao, Some("abc123".to_string()), None)
            .await
            .unwrap();

        assert!(matches!(
            service
                .logout(ProviderKind::Google, Some(outcome.session.token.clone()))
                .await,
            Err(AuthError::Unauthorized)
        ));
        // The session survives the mismatched logout
        assert_eq!(
            service.authenticate(outcome.session.token.clone()).await.unwrap().id.0,
            "kakao:7"
        );
        assert!(service
            .logout(ProviderKind::Kakao, Some(outcome.session.token))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_logout_uses_configured_continuation() {
        let config = AuthConfig {
            logout_redirect_url: Some("https://app.example.com/bye".to_string()),
            ..AuthConfig::default()
        };
        let h = harness_with(alice(), InMemoryUserRepository::new(), config);
        let outcome = h
            .service
            .handle_callback(ProviderKind::Google, Some("abc123".to_string()), None)
            .await
            .unwrap();

        let url = h
            .service
            .logout(ProviderKind::Google, Some(outcome.session.token))
            .await
            .unwrap();
        assert!(url.contains("continue=https%3A%2F%2Fapp.example.com%2Fbye"));
    }

    #[tokio::test]
    async fn test_expired_session_is_unauthorized() {
        let h = harness(alice());
        let outcome = h
            .service
            .handle_callback(ProviderKind::Google, Some("abc123".to_string()), None)
            .await
            .unwrap();

        h.sessions.expire_all();

        assert!(matches!(
            h.service.authenticate(outcome.session.token).await,
            Err(AuthError::Unauthorized)
        ));
    }
}
