//! Domain service for authentication.
//!
//! Handles sign-up, sign-in, session lookup and password changes. All of it is
//! delegated to the auth subsystem behind [`AuthBackend`](crate::clients::AuthBackend).

use serde_json::{Map, Value};
use thiserror::Error;

use crate::clients::backend::BackendError;
use crate::models::{AuthResponse, Session, User};

/// Path on the web front end that receives password-reset links.
pub const RESET_PASSWORD_PATH: &str = "/reset-password";

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AuthError {
    /// True when the operation needed a signed-in user and there was none.
    #[must_use]
    pub const fn is_session_missing(&self) -> bool {
        matches!(self, Self::Backend(BackendError::SessionMissing))
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Registers a user. `metadata` (full name, username, ...) becomes user metadata.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthResponse, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The signed-in user, as the auth server currently sees them.
    ///
    /// # Errors
    ///
    /// Fails with a missing-session error when nobody is signed in.
    async fn current_user(&self) -> Result<User, AuthError>;

    /// The current session, or `None` when signed out.
    async fn session(&self) -> Result<Option<Session>, AuthError>;

    /// Sends a reset link that lands on the front end's reset page.
    async fn reset_password(&self, email: &str) -> Result<(), AuthError>;

    async fn update_password(&self, new_password: &str) -> Result<User, AuthError>;
}

/// Whether the user's metadata carries the admin flag.
#[must_use]
pub fn is_admin(user: Option<&User>) -> bool {
    user.is_some_and(User::is_admin)
}

/// Builds the redirect target for reset links from the site origin.
#[must_use]
pub fn reset_redirect_url(site_url: &str) -> String {
    format!("{}{RESET_PASSWORD_PATH}", site_url.trim_end_matches('/'))
}
