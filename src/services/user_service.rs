//! Domain service for user profiles and the admin flag.

use thiserror::Error;

use crate::clients::backend::BackendError;
use crate::domain::UserId;
use crate::models::{NewProfile, Profile, ProfilePatch};

pub const PROFILES_TABLE: &str = "profiles";

/// Errors specific to profile operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Unexpected profile shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend returned no representation for the written profile")]
    EmptyResponse,
}

/// Domain service trait for profiles.
#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Fetches one profile. No matching row is an error.
    async fn profile(&self, user_id: UserId) -> Result<Profile, UserError>;

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, UserError>;

    /// `None` when no profile row matched.
    async fn update_profile(
        &self,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<Option<Profile>, UserError>;

    /// All profiles, most recently created first.
    async fn list_profiles(&self) -> Result<Vec<Profile>, UserError>;

    async fn delete_profile(&self, user_id: UserId) -> Result<(), UserError>;

    /// Sets the admin flag in the auth user metadata, then in the profile row.
    ///
    /// The two writes are not transactional. If the profile write fails the
    /// metadata change stays in place and the error is returned.
    async fn toggle_admin_status(
        &self,
        user_id: UserId,
        is_admin: bool,
    ) -> Result<Option<Profile>, UserError>;
}
