use std::sync::Arc;

use crate::clients::{AuthBackend, MemoryBackend, SupabaseClient, TableBackend};
use crate::config::Config;
use crate::services::{
    AuthService, EntryService, RemoteAuthService, RemoteEntryService, RemoteUserService,
    UserService,
};

/// The three services, wired to one backend.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub auth: Arc<dyn AuthService>,

    pub entries: Arc<dyn EntryService>,

    pub users: Arc<dyn UserService>,
}

impl SharedState {
    /// Connects to the Supabase project described by `config`.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = Arc::new(SupabaseClient::from_config(&config.supabase)?);
        Ok(Self::with_backend(config, client.clone(), client))
    }

    /// Runs every service against an in-process backend.
    #[must_use]
    pub fn in_memory(config: Config) -> (Self, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let state = Self::with_backend(config, backend.clone(), backend.clone());
        (state, backend)
    }

    #[must_use]
    pub fn with_backend(
        config: Config,
        tables: Arc<dyn TableBackend>,
        auth: Arc<dyn AuthBackend>,
    ) -> Self {
        let auth_service = Arc::new(RemoteAuthService::new(auth.clone(), &config.app.site_url));
        let entries = Arc::new(RemoteEntryService::new(tables.clone()));
        let users = Arc::new(RemoteUserService::new(tables, auth));

        Self {
            config: Arc::new(config),
            auth: auth_service,
            entries,
            users,
        }
    }
}
