// API Middleware
//
// Session cookie authentication for the user-facing routes.

pub mod auth;

// Re-export commonly used items
pub use auth::{auth_middleware, AuthState, AuthenticatedUser};
