use super::ports::{AuthError, User, UserId, UserRepository};
use std::sync::Arc;

/// Read-side lookups on the user store for the callback pipeline
#[derive(Clone)]
pub struct IdentityResolver {
    user_repository: Arc<dyn UserRepository>,
}

impl IdentityResolver {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }

    /// Whether a user with this identity key has already registered
    pub async fn exists(&self, id: &UserId) -> Result<bool, AuthError> {
        Ok(self.resolve(id).await?.is_some())
    }

    pub async fn resolve(&self, id: &UserId) -> Result<Option<User>, AuthError> {
        self.user_repository
            .get_by_id(id)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to get user: {e}")))
    }
}
