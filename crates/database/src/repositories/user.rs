use crate::models::User;
use crate::pool::DbPool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use services::auth::{CreateUserResult, NewUser, ProviderKind};
use tracing::debug;

pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a user unless one with the same id exists.
    /// Returns `None` when the row was already there.
    pub async fn create_if_absent(
        &self,
        id: &str,
        name: &str,
        email: Option<&str>,
        auth_provider: &str,
    ) -> Result<Option<User>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt(
                r#"
            INSERT INTO users (id, name, email, auth_provider, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
                &[&id, &name, &email, &auth_provider, &Utc::now()],
            )
            .await
            .context("Failed to create user")?;

        match row {
            Some(row) => {
                debug!("Created user: {}", id);
                Ok(Some(self.row_to_user(row)?))
            }
            None => {
                debug!("User already exists: {}", id);
                Ok(None)
            }
        }
    }

    /// Get a user by ID
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt("SELECT * FROM users WHERE id = $1", &[&id])
            .await
            .context("Failed to query user")?;

        match row {
            Some(row) => Ok(Some(self.row_to_user(row)?)),
            None => Ok(None),
        }
    }

    /// Delete a user with no sessions. A user someone already logged in as stays.
    pub async fn delete_unused(&self, id: &str) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let result = client
            .execute(
                r#"
            DELETE FROM users
            WHERE id = $1
              AND NOT EXISTS (SELECT 1 FROM sessions WHERE user_id = $1)
            "#,
                &[&id],
            )
            .await
            .context("Failed to delete user")?;

        debug!("Deleted {} unused user row(s) for {}", result, id);
        Ok(result > 0)
    }

    // Helper function to convert database row to User
    fn row_to_user(&self, row: tokio_postgres::Row) -> Result<User> {
        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            auth_provider: row.try_get("auth_provider")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn db_user_to_service_user(db_user: User) -> Result<services::auth::User> {
    let auth_provider: ProviderKind = db_user
        .auth_provider
        .parse()
        .with_context(|| format!("Unknown auth provider for user {}", db_user.id))?;

    Ok(services::auth::User {
        id: services::auth::UserId(db_user.id),
        name: db_user.name,
        email: db_user.email,
        auth_provider,
        created_at: db_user.created_at,
    })
}

// Implement the service trait
#[async_trait]
impl services::auth::UserRepository for UserRepository {
    async fn get_by_id(
        &self,
        id: &services::auth::UserId,
    ) -> anyhow::Result<Option<services::auth::User>> {
        self.get_by_id(&id.0)
            .await?
            .map(db_user_to_service_user)
            .transpose()
    }

    async fn create_if_absent(&self, user: NewUser) -> anyhow::Result<CreateUserResult> {
        let created = self
            .create_if_absent(
                &user.id.0,
                &user.name,
                user.email.as_deref(),
                user.auth_provider.as_str(),
            )
            .await?;

        match created {
            Some(db_user) => Ok(CreateUserResult::Created(db_user_to_service_user(db_user)?)),
            None => Ok(CreateUserResult::Conflict),
        }
    }

    async fn delete_unused(&self, id: &services::auth::UserId) -> anyhow::Result<bool> {
        self.delete_unused(&id.0).await
    }
}
