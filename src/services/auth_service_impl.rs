//! Backend-agnostic implementation of the `AuthService` trait.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::clients::backend::AuthBackend;
use crate::models::{AuthResponse, Session, User, UserAttributes};
use crate::services::auth_service::{AuthError, AuthService, reset_redirect_url};

#[derive(Clone)]
pub struct RemoteAuthService {
    auth: Arc<dyn AuthBackend>,
    reset_redirect: String,
}

impl RemoteAuthService {
    /// `site_url` is the front end's origin. Reset links point at its reset page.
    #[must_use]
    pub fn new(auth: Arc<dyn AuthBackend>, site_url: &str) -> Self {
        Self {
            auth,
            reset_redirect: reset_redirect_url(site_url),
        }
    }
}

#[async_trait]
impl AuthService for RemoteAuthService {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthResponse, AuthError> {
        Ok(self.auth.sign_up(email, password, metadata).await?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        Ok(self.auth.sign_in_with_password(email, password).await?)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.auth.sign_out().await?;
        info!("Signed out");
        Ok(())
    }

    async fn current_user(&self) -> Result<User, AuthError> {
        Ok(self.auth.get_user().await?)
    }

    async fn session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.auth.get_session().await?)
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        Ok(self
            .auth
            .reset_password_for_email(email, &self.reset_redirect)
            .await?)
    }

    async fn update_password(&self, new_password: &str) -> Result<User, AuthError> {
        let attributes = UserAttributes {
            password: Some(new_password.to_string()),
            ..UserAttributes::default()
        };
        Ok(self.auth.update_user(attributes).await?)
    }
}
