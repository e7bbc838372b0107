use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub use config::{CookieConfig as CookiePolicy, SameSitePolicy};

// Domain ID types

/// Provider-scoped identity key, `"<provider>:<provider user id>"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

/// Opaque session credential as carried by the `session_id` cookie.
/// Only its hash is ever stored.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionToken(pub String);

impl UserId {
    pub fn scoped(provider: ProviderKind, provider_user_id: &str) -> Self {
        UserId(format!("{}:{}", provider.as_str(), provider_user_id))
    }

    pub fn belongs_to(&self, provider: ProviderKind) -> bool {
        self.0
            .strip_prefix(provider.as_str())
            .is_some_and(|rest| rest.starts_with(':'))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        SessionId(uuid)
    }
}

// Tokens end up in logs through `{:?}` on request structs, so keep them masked
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(9).collect();
        write!(f, "SessionToken({prefix}…)")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Kakao,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Google, ProviderKind::Kakao];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Kakao => "kakao",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(ProviderKind::Google),
            "kakao" => Ok(ProviderKind::Kakao),
            other => Err(AuthError::ProviderNotFound(other.to_string())),
        }
    }
}

// Domain models

/// Claims returned by a provider after a successful code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub provider: ProviderKind,
    pub provider_user_id: String,
    pub name: String,
    pub email: Option<String>,
}

impl ProviderIdentity {
    pub fn user_id(&self) -> UserId {
        UserId::scoped(self.provider, &self.provider_user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub auth_provider: ProviderKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub auth_provider: ProviderKind,
}

impl From<&ProviderIdentity> for NewUser {
    fn from(identity: &ProviderIdentity) -> Self {
        Self {
            id: identity.user_id(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            auth_provider: identity.provider,
        }
    }
}

/// Outcome of an insert-if-absent on the user store
#[derive(Debug, Clone)]
pub enum CreateUserResult {
    Created(User),
    /// A row with the same identity key already exists
    Conflict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Everything the HTTP layer needs to place the session cookie
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    pub session_id: SessionId,
    pub token: SessionToken,
    pub expires_at: DateTime<Utc>,
    pub cookie: CookiePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthAction {
    Register,
    Login,
}

impl AuthAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthAction::Register => "register",
            AuthAction::Login => "login",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthAction::Register => "register process is complete",
            AuthAction::Login => "login process is complete",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub action: AuthAction,
    pub user: User,
    /// Name as reported by the provider on this callback
    pub display_name: String,
    pub session: SessionDescriptor,
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream authentication failed: {0}")]
    UpstreamAuthFailure(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Unknown or unconfigured provider: {0}")]
    ProviderNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

// Repository traits
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, id: &UserId) -> anyhow::Result<Option<User>>;

    /// Insert the user unless a row with the same id exists.
    /// Must be atomic with respect to concurrent calls for the same id.
    async fn create_if_absent(&self, user: NewUser) -> anyhow::Result<CreateUserResult>;

    /// Remove a user that owns no sessions. Returns whether a row was removed.
    async fn delete_unused(&self, id: &UserId) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: NewSession) -> anyhow::Result<Session>;

    /// Look up a non-expired session by the hash of its token
    async fn validate(&self, token_hash: &str) -> anyhow::Result<Option<Session>>;

    async fn revoke(&self, session_id: SessionId) -> anyhow::Result<bool>;
}

/// One external identity provider
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Where `/login` redirects the browser
    fn authorization_url(&self) -> Result<String, AuthError>;

    /// Trade an authorization code for the user's identity claims
    async fn exchange(&self, code: String) -> Result<ProviderIdentity, AuthError>;

    /// Provider-level logout, continuing to `continue_to` or, when absent,
    /// to the provider's configured redirect URL
    fn logout_url(&self, continue_to: Option<String>) -> Result<String, AuthError>;
}

// Service interfaces
#[async_trait]
pub trait AuthServiceTrait: Send + Sync {
    fn authorization_url(&self, provider: ProviderKind) -> Result<String, AuthError>;

    /// Run the callback pipeline: exchange, resolve, register or login, issue
    async fn handle_callback(
        &self,
        provider: ProviderKind,
        code: Option<String>,
        existing_session: Option<SessionToken>,
    ) -> Result<CallbackOutcome, AuthError>;

    /// Resolve a presented session token to its user
    async fn authenticate(&self, token: SessionToken) -> Result<User, AuthError>;

    /// Invalidate the session, then return the provider logout URL
    async fn logout(
        &self,
        provider: ProviderKind,
        token: Option<SessionToken>,
    ) -> Result<String, AuthError>;
}
