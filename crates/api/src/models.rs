use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================
// Auth Models
// ============================================

/// Body posted by the frontend after the provider redirected back with a code
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CallbackRequest {
    /// Authorization code issued by the provider
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CallbackResponse {
    /// Human readable completion message
    pub message: String,
    /// `register` for a first-time identity, `login` otherwise
    pub action_type: String,
    /// Display name reported by the provider
    pub name: String,
}

// ============================================
// User Models
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub provider: String,
}

impl From<services::auth::User> for UserResponse {
    fn from(user: services::auth::User) -> Self {
        Self {
            id: user.id.0,
            name: user.name,
            email: user.email,
            provider: user.auth_provider.to_string(),
        }
    }
}

// ============================================
// Error Models
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: String, error_type: String) -> Self {
        Self {
            error: ErrorDetail {
                message,
                r#type: error_type,
                param: None,
                code: None,
            },
        }
    }

    pub fn with_param(message: String, error_type: String, param: String) -> Self {
        Self {
            error: ErrorDetail {
                message,
                r#type: error_type,
                param: Some(param),
                code: None,
            },
        }
    }
}
