// In-memory ports for exercising the auth pipeline without Postgres or a live provider

use super::ports::{
    AuthError, CreateUserResult, NewSession, NewUser, ProviderClient, ProviderIdentity,
    ProviderKind, Session, SessionId, SessionRepository, User, UserId, UserRepository,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Barrier;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<UserId, User>>,
    create_calls: AtomicUsize,
    fail_reads: AtomicBool,
    create_barrier: Option<Barrier>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every `create_if_absent` call until `n` of them are pending,
    /// forcing concurrent registrations to race on the insert
    pub fn with_create_barrier(n: usize) -> Self {
        Self {
            create_barrier: Some(Barrier::new(n)),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.users.lock().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_by_id(&self, id: &UserId) -> anyhow::Result<Option<User>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("user store unavailable");
        }
        let users = self
            .users
            .lock()
            .map_err(|_| anyhow::anyhow!("user store poisoned"))?;
        Ok(users.get(id).cloned())
    }

    async fn create_if_absent(&self, user: NewUser) -> anyhow::Result<CreateUserResult> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.create_barrier {
            barrier.wait().await;
        }

        let mut users = self
            .users
            .lock()
            .map_err(|_| anyhow::anyhow!("user store poisoned"))?;
        if users.contains_key(&user.id) {
            return Ok(CreateUserResult::Conflict);
        }

        let created = User {
            id: user.id.clone(),
            name: user.name,
            email: user.email,
            auth_provider: user.auth_provider,
            created_at: Utc::now(),
        };
        users.insert(user.id, created.clone());
        Ok(CreateUserResult::Created(created))
    }

    // No session store to consult here, callers only use it on a failed registration
    async fn delete_unused(&self, id: &UserId) -> anyhow::Result<bool> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| anyhow::anyhow!("user store poisoned"))?;
        Ok(users.remove(id).is_some())
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<Vec<Session>>,
    fail_writes: AtomicBool,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every stored session, expired ones included
    pub fn all(&self) -> Vec<Session> {
        self.sessions
            .lock()
            .map(|sessions| sessions.clone())
            .unwrap_or_default()
    }

    /// Move every session's expiry into the past
    pub fn expire_all(&self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            let past = Utc::now() - ChronoDuration::seconds(1);
            for session in sessions.iter_mut() {
                session.expires_at = past;
            }
        }
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: NewSession) -> anyhow::Result<Session> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("session store unavailable");
        }
        let stored = Session {
            id: SessionId(Uuid::new_v4()),
            user_id: session.user_id,
            token_hash: session.token_hash,
            created_at: Utc::now(),
            expires_at: session.expires_at,
        };
        self.sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("session store poisoned"))?
            .push(stored.clone());
        Ok(stored)
    }

    async fn validate(&self, token_hash: &str) -> anyhow::Result<Option<Session>> {
        let now = Utc::now();
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("session store poisoned"))?;
        Ok(sessions
            .iter()
            .find(|s| s.token_hash == token_hash && s.expires_at > now)
            .cloned())
    }

    async fn revoke(&self, session_id: SessionId) -> anyhow::Result<bool> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("session store poisoned"))?;
        let before = sessions.len();
        sessions.retain(|s| s.id != session_id);
        Ok(sessions.len() < before)
    }
}

enum StaticOutcome {
    Identity(ProviderIdentity),
    Fail(String),
}

/// Provider that answers every exchange with a fixed result
pub struct StaticProvider {
    kind: ProviderKind,
    outcome: StaticOutcome,
    delay: Option<Duration>,
    exchange_calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(identity: ProviderIdentity) -> Self {
        Self {
            kind: identity.provider,
            outcome: StaticOutcome::Identity(identity),
            delay: None,
            exchange_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: ProviderKind, message: &str) -> Self {
        Self {
            kind,
            outcome: StaticOutcome::Fail(message.to_string()),
            delay: None,
            exchange_calls: AtomicUsize::new(0),
        }
    }

    /// Stall each exchange for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for StaticProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn authorization_url(&self) -> Result<String, AuthError> {
        Ok(format!(
            "https://{}.example.com/authorize?client_id=test-client",
            self.kind
        ))
    }

    async fn exchange(&self, _code: String) -> Result<ProviderIdentity, AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.outcome {
            StaticOutcome::Identity(identity) => Ok(identity.clone()),
            StaticOutcome::Fail(message) => Err(AuthError::UpstreamAuthFailure(message.clone())),
        }
    }

    fn logout_url(&self, continue_to: Option<String>) -> Result<String, AuthError> {
        let base = format!("https://{}.example.com/logout", self.kind);
        let continue_to = continue_to.unwrap_or_else(|| "http://localhost:3000/".to_string());
        url::Url::parse_with_params(&base, &[("continue", continue_to.as_str())])
            .map(|url| url.to_string())
            .map_err(|e| AuthError::ConfigError(e.to_string()))
    }
}

pub fn identity(provider: ProviderKind, provider_user_id: &str, name: &str) -> ProviderIdentity {
    ProviderIdentity {
        provider,
        provider_user_id: provider_user_id.to_string(),
        name: name.to_string(),
        email: Some(format!("{}@x.com", name.to_lowercase())),
    }
}
