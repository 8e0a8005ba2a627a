//! Authentication endpoints.

use super::client::ApiClient;
use super::error::ApiError;
use super::types::{AuthResponse, Credentials, User};

/// Provider-neutral async trait for the backend's auth endpoints. Enables mocking in tests.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// Register a new account. Fails with `Conflict` when the email is taken.
    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;

    /// Exchange credentials for a token. Fails with `Auth` on bad credentials.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;

    /// Profile of the user the attached token belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] when the token is missing, invalid, or expired.
    async fn fetch_current_user(&self) -> Result<User, ApiError>;
}

#[async_trait::async_trait]
impl AuthApi for ApiClient {
    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.post("/api/auth/signup", credentials).await
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.post("/api/auth/signin", credentials).await
    }

    async fn fetch_current_user(&self) -> Result<User, ApiError> {
        self.get("/api/auth/me").await
    }
}
