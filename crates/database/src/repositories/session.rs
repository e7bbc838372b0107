use crate::models::Session;
use crate::pool::DbPool;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

pub struct SessionRepository {
    pool: DbPool,
}

impl SessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store a session under the hash of its token
    pub async fn create(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = client
            .query_one(
                r#"
            INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
                &[&id, &user_id, &token_hash, &now, &expires_at],
            )
            .await
            .context("Failed to create session")?;

        debug!("Created session: {} for user: {}", id, user_id);
        self.row_to_session(row)
    }

    /// Find a non-expired session by token hash
    pub async fn validate(&self, token_hash: &str) -> Result<Option<Session>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt(
                r#"
            SELECT * FROM sessions
            WHERE token_hash = $1 AND expires_at > $2
            "#,
                &[&token_hash, &Utc::now()],
            )
            .await
            .context("Failed to validate session")?;

        match row {
            Some(row) => Ok(Some(self.row_to_session(row)?)),
            None => Ok(None),
        }
    }

    /// Delete a session. Returns whether a row was removed.
    pub async fn revoke(&self, session_id: Uuid) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let result = client
            .execute("DELETE FROM sessions WHERE id = $1", &[&session_id])
            .await
            .context("Failed to revoke session")?;

        debug!("Revoked session: {}", session_id);
        Ok(result > 0)
    }

    /// Clean up expired sessions
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let result = client
            .execute("DELETE FROM sessions WHERE expires_at < $1", &[&Utc::now()])
            .await
            .context("Failed to cleanup expired sessions")?;

        debug!("Cleaned up {} expired sessions", result);
        Ok(result)
    }

    // Helper function to convert database row to Session
    fn row_to_session(&self, row: tokio_postgres::Row) -> Result<Session> {
        Ok(Session {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            token_hash: row.try_get("token_hash")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

fn db_session_to_service_session(db_session: Session) -> services::auth::Session {
    services::auth::Session {
        id: services::auth::SessionId(db_session.id),
        user_id: services::auth::UserId(db_session.user_id),
        token_hash: db_session.token_hash,
        created_at: db_session.created_at,
        expires_at: db_session.expires_at,
    }
}

// Implement the service trait
#[async_trait::async_trait]
impl services::auth::SessionRepository for SessionRepository {
    async fn create(
        &self,
        session: services::auth::NewSession,
    ) -> anyhow::Result<services::auth::Session> {
        let db_session = self
            .create(&session.user_id.0, &session.token_hash, session.expires_at)
            .await?;
        Ok(db_session_to_service_session(db_session))
    }

    async fn validate(&self, token_hash: &str) -> anyhow::Result<Option<services::auth::Session>> {
        let maybe_session = self.validate(token_hash).await?;
        Ok(maybe_session.map(db_session_to_service_session))
    }

    async fn revoke(&self, session_id: services::auth::SessionId) -> anyhow::Result<bool> {
        self.revoke(session_id.0).await
    }
}
