use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of the `users` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Provider-scoped identity key, e.g. `google:1234`
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    /// OAuth provider (google, kakao)
    pub auth_provider: String,
    pub created_at: DateTime<Utc>,
}

/// Row of the `sessions` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
