//! Backend-agnostic implementation of the `UserService` trait.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::backend::{AuthBackend, Direction, Filter, Query, TableBackend};
use crate::domain::UserId;
use crate::models::{AdminUserAttributes, NewProfile, Profile, ProfilePatch};
use crate::services::user_service::{PROFILES_TABLE, UserError, UserService};

#[derive(Clone)]
pub struct RemoteUserService {
    tables: Arc<dyn TableBackend>,
    auth: Arc<dyn AuthBackend>,
}

impl RemoteUserService {
    #[must_use]
    pub fn new(tables: Arc<dyn TableBackend>, auth: Arc<dyn AuthBackend>) -> Self {
        Self { tables, auth }
    }

    async fn patch_profile(
        &self,
        user_id: UserId,
        patch: Value,
    ) -> Result<Option<Profile>, UserError> {
        let updated = self
            .tables
            .update(PROFILES_TABLE, &[Filter::eq("id", user_id)], patch)
            .await?;

        match updated.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserService for RemoteUserService {
    async fn profile(&self, user_id: UserId) -> Result<Profile, UserError> {
        let query = Query::table(PROFILES_TABLE).eq("id", user_id);
        let row = self.tables.select_single(&query).await?;
        Ok(serde_json::from_value(row)?)
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, UserError> {
        let row = serde_json::to_value(&profile)?;
        let inserted = self.tables.insert(PROFILES_TABLE, vec![row]).await?;

        let row = inserted.into_iter().next().ok_or(UserError::EmptyResponse)?;
        Ok(serde_json::from_value(row)?)
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<Option<Profile>, UserError> {
        self.patch_profile(user_id, serde_json::to_value(&patch)?)
            .await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, UserError> {
        let query = Query::table(PROFILES_TABLE).order("created_at", Direction::Desc);
        let rows = self.tables.select(&query).await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(UserError::from))
            .collect()
    }

    async fn delete_profile(&self, user_id: UserId) -> Result<(), UserError> {
        self.tables
            .delete(PROFILES_TABLE, &[Filter::eq("id", user_id)])
            .await?;

        info!(%user_id, "Deleted profile");
        Ok(())
    }

    async fn toggle_admin_status(
        &self,
        user_id: UserId,
        is_admin: bool,
    ) -> Result<Option<Profile>, UserError> {
        let mut metadata = Map::new();
        metadata.insert("is_admin".to_string(), Value::Bool(is_admin));

        self.auth
            .admin_update_user_by_id(
                user_id,
                AdminUserAttributes {
                    user_metadata: Some(metadata),
                    app_metadata: None,
                },
            )
            .await?;

        match self
            .patch_profile(user_id, json!({ "is_admin": is_admin }))
            .await
        {
            Ok(profile) => {
                info!(%user_id, is_admin, "Admin status updated");
                Ok(profile)
            }
            Err(e) => {
                warn!(
                    %user_id,
                    is_admin,
                    error = %e,
                    "Auth metadata updated but profile update failed; admin flag now differs between the two"
                );
                Err(e)
            }
        }
    }
}
