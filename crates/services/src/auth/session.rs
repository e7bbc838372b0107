use super::ports::{
    AuthError, CookiePolicy, NewSession, Session, SessionDescriptor, SessionRepository,
    SessionToken, User,
};
use chrono::{Duration, Utc};
use config::MAX_SESSION_LIFETIME_HOURS;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Mints, resolves and revokes browser sessions
#[derive(Clone)]
pub struct SessionIssuer {
    session_repository: Arc<dyn SessionRepository>,
    lifetime: Duration,
    cookie: CookiePolicy,
}

impl SessionIssuer {
    pub fn new(
        session_repository: Arc<dyn SessionRepository>,
        lifetime_hours: i64,
        cookie: CookiePolicy,
    ) -> Self {
        Self {
            session_repository,
            // Keeps `now + lifetime` inside chrono's range for unvalidated configs
            lifetime: Duration::hours(lifetime_hours.clamp(1, MAX_SESSION_LIFETIME_HOURS)),
            cookie,
        }
    }

    /// Generate a new session token
    pub fn generate_token() -> SessionToken {
        SessionToken(format!("sess_{}", Uuid::new_v4().simple()))
    }

    /// Hash a session token for storage
    pub fn hash_token(token: &SessionToken) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.0.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn cookie_policy(&self) -> &CookiePolicy {
        &self.cookie
    }

    /// Store a fresh session for `user`.
    ///
    /// A token is always newly minted. When `existing` still resolves to a
    /// live session of the same user, that session is revoked once the new
    /// one is stored, so the browser does not accumulate credentials.
    pub async fn issue(
        &self,
        user: &User,
        existing: Option<&SessionToken>,
    ) -> Result<SessionDescriptor, AuthError> {
        let token = Self::generate_token();
        let expires_at = Utc::now() + self.lifetime;

        let session = self
            .session_repository
            .create(NewSession {
                user_id: user.id.clone(),
                token_hash: Self::hash_token(&token),
                expires_at,
            })
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to create session: {e}")))?;

        debug!("Created session {} for user {}", session.id, user.id);

        if let Some(existing) = existing {
            self.replace_previous(user, existing).await;
        }

        Ok(SessionDescriptor {
            session_id: session.id,
            token,
            expires_at: session.expires_at,
            cookie: self.cookie.clone(),
        })
    }

    async fn replace_previous(&self, user: &User, existing: &SessionToken) {
        let previous = match self.resolve(existing).await {
            Ok(Some(previous)) if previous.user_id == user.id => previous,
            Ok(_) => return,
            Err(e) => {
                warn!("Failed to look up previous session: {e}");
                return;
            }
        };

        // The new session is already stored, a stale one only lingers until expiry
        if let Err(e) = self.revoke(&previous).await {
            warn!("Failed to revoke previous session {}: {e}", previous.id);
        }
    }

    /// Look up the live session behind a presented token
    pub async fn resolve(&self, token: &SessionToken) -> Result<Option<Session>, AuthError> {
        let session = self
            .session_repository
            .validate(&Self::hash_token(token))
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to validate session: {e}")))?;

        Ok(session.filter(|s| s.is_active_at(Utc::now())))
    }

    pub async fn revoke(&self, session: &Session) -> Result<bool, AuthError> {
        self.session_repository
            .revoke(session.id)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to revoke session: {e}")))
    }
}
