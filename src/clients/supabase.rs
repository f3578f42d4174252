use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::clients::backend::{
    ApiError, AuthBackend, BackendError, Filter, Query, TableBackend,
};
use crate::clients::session::SessionStore;
use crate::config::SupabaseConfig;
use crate::domain::UserId;
use crate::models::{AdminUserAttributes, AuthResponse, Session, User, UserAttributes};

/// PostgREST code for a single-row fetch that matched zero or several rows.
pub const NO_ROWS_CODE: &str = "PGRST116";

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";
const USER_AGENT: &str = concat!("ndt-hours/", env!("CARGO_PKG_VERSION"));

/// Sessions expiring sooner than this are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// HTTP client for a Supabase project: PostgREST under `/rest/v1`, GoTrue
/// under `/auth/v1`.
pub struct SupabaseClient {
    client: Client,
    base_url: Url,
    anon_key: String,
    service_role_key: Option<String>,
    session: RwLock<Option<Session>>,
    store: Option<SessionStore>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, BackendError> {
        Self::build(base_url, anon_key, None)
    }

    pub fn from_config(config: &SupabaseConfig) -> Result<Self, BackendError> {
        let timeout = Duration::from_secs(u64::from(config.request_timeout_seconds));
        let client = Self::build(&config.url, &config.anon_key, Some(timeout))?;

        let client = match &config.service_role_key {
            Some(key) if !key.is_empty() => client.with_service_role_key(key),
            _ => client,
        };

        let store = config
            .session_file
            .as_ref()
            .map_or_else(|| SessionStore::new(SessionStore::default_path()), SessionStore::new);

        client.with_session_store(store)
    }

    fn build(
        base_url: &str,
        anon_key: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        // Url::join drops the last path segment unless the base ends in '/'.
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;

        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            anon_key: anon_key.to_string(),
            service_role_key: None,
            session: RwLock::new(None),
            store: None,
        })
    }

    #[must_use]
    pub fn with_service_role_key(mut self, key: &str) -> Self {
        self.service_role_key = Some(key.to_string());
        self
    }

    /// Persists the session through `store` and resumes any session already saved there.
    pub fn with_session_store(mut self, store: SessionStore) -> Result<Self, BackendError> {
        *self.session.get_mut() = store.load()?;
        self.store = Some(store);
        Ok(self)
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(path)?)
    }

    fn table_url(&self, table: &str, params: Vec<(String, String)>) -> Result<Url, BackendError> {
        let mut url = self.endpoint(&format!("rest/v1/{table}"))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// The caller's access token when signed in, otherwise the anon key.
    async fn bearer(&self) -> Result<String, BackendError> {
        Ok(self
            .get_session()
            .await?
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token))
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, BackendError> {
        let token = self.bearer().await?;
        Ok(request.header("apikey", &self.anon_key).bearer_auth(token))
    }

    fn anonymous(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn set_session(&self, session: Option<Session>) -> Result<(), BackendError> {
        if let Some(store) = &self.store {
            match &session {
                Some(s) => store.save(s)?,
                None => store.clear()?,
            }
        }
        *self.session.write().await = session;
        Ok(())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        debug!("Refreshing auth session");

        let request = self
            .anonymous(self.client.post(url))
            .json(&json!({ "refresh_token": refresh_token }));

        let response = match send(request).await {
            Ok(response) => response,
            // The refresh token is dead. Forget the session so later calls use the anon key.
            Err(BackendError::Api(err)) if (400..500).contains(&err.status) => {
                warn!(
                    status = err.status,
                    code = ?err.code,
                    "Refresh token rejected, dropping session"
                );
                self.set_session(None).await?;
                return Err(BackendError::Api(err));
            }
            Err(e) => return Err(e),
        };
        let session: Session = decode(response).await?;
        let session = session.with_expiry_from(Utc::now());

        self.set_session(Some(session.clone())).await?;
        Ok(session)
    }

    async fn accept_auth_response(&self, body: Value) -> Result<AuthResponse, BackendError> {
        let response = parse_auth_response(body)?;
        if let Some(session) = &response.session {
            self.set_session(Some(session.clone())).await?;
        }
        Ok(response)
    }
}

async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(map_api_error(ApiError::from_body(status.as_u16(), &body)))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Translates the store's "no rows" sentinel into [`BackendError::NotFound`].
fn map_api_error(err: ApiError) -> BackendError {
    if err.code.as_deref() == Some(NO_ROWS_CODE) {
        BackendError::NotFound(err.message)
    } else {
        BackendError::Api(err)
    }
}

/// Sign-up answers with a session when auto-confirm is on, otherwise with the
/// bare user (or `{"user": .., "session": null}` on newer servers).
fn parse_auth_response(body: Value) -> Result<AuthResponse, BackendError> {
    if body.get("access_token").is_some() {
        let session: Session = serde_json::from_value(body)?;
        let session = session.with_expiry_from(Utc::now());
        return Ok(AuthResponse {
            user: Some(session.user.clone()),
            session: Some(session),
        });
    }

    if let Some(user) = body.get("user").filter(|u| u.is_object()) {
        let user: User = serde_json::from_value(user.clone())?;
        return Ok(AuthResponse {
            user: Some(user),
            session: None,
        });
    }

    let user: User = serde_json::from_value(body)?;
    Ok(AuthResponse {
        user: Some(user),
        session: None,
    })
}

#[async_trait::async_trait]
impl TableBackend for SupabaseClient {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(&query.table, query.to_params())?;
        debug!(table = %query.table, filters = query.filters.len(), "Selecting rows");

        let request = self.authorized(self.client.get(url)).await?;
        decode(send(request).await?).await
    }

    async fn select_single(&self, query: &Query) -> Result<Value, BackendError> {
        let url = self.table_url(&query.table, query.to_params())?;
        debug!(table = %query.table, "Selecting single row");

        let request = self
            .authorized(self.client.get(url))
            .await?
            .header("Accept", SINGLE_OBJECT);
        decode(send(request).await?).await
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table, vec![("select".to_string(), "*".to_string())])?;
        debug!(table, rows = rows.len(), "Inserting rows");

        let request = self
            .authorized(self.client.post(url))
            .await?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&Value::Array(rows));
        decode(send(request).await?).await
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filters.iter().map(Filter::to_param));
        let url = self.table_url(table, params)?;
        debug!(table, "Updating rows");

        let request = self
            .authorized(self.client.patch(url))
            .await?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);
        decode(send(request).await?).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), BackendError> {
        let url = self.table_url(table, filters.iter().map(Filter::to_param).collect())?;
        debug!(table, "Deleting rows");

        let request = self.authorized(self.client.delete(url)).await?;
        send(request).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthBackend for SupabaseClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthResponse, BackendError> {
        let url = self.endpoint("auth/v1/signup")?;
        let request = self.anonymous(self.client.post(url)).json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));

        let body: Value = decode(send(request).await?).await?;
        let response = self.accept_auth_response(body).await?;
        info!(email, confirmed = response.session.is_some(), "Signed up");
        Ok(response)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, BackendError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let request = self
            .anonymous(self.client.post(url))
            .json(&json!({ "email": email, "password": password }));

        let body: Value = decode(send(request).await?).await?;
        let response = self.accept_auth_response(body).await?;
        info!(email, "Signed in");
        Ok(response)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let previous = self.session.read().await.clone();
        self.set_session(None).await?;

        let Some(session) = previous else {
            return Ok(());
        };

        let url = self.endpoint("auth/v1/logout")?;
        let request = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token);

        match send(request).await {
            Ok(_) => Ok(()),
            // The server already forgot the token.
            Err(BackendError::Api(err))
                if [
                    StatusCode::UNAUTHORIZED,
                    StatusCode::FORBIDDEN,
                    StatusCode::NOT_FOUND,
                ]
                .iter()
                .any(|s| s.as_u16() == err.status) =>
            {
                debug!(status = err.status, "Session already revoked");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn get_user(&self) -> Result<User, BackendError> {
        let session = self
            .get_session()
            .await?
            .ok_or(BackendError::SessionMissing)?;

        let url = self.endpoint("auth/v1/user")?;
        let request = self
            .client
            .get(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token);
        decode(send(request).await?).await
    }

    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let current = self.session.read().await.clone();

        match current {
            Some(session) if session.expires_within(Utc::now(), REFRESH_MARGIN_SECS) => {
                self.refresh_session(&session.refresh_token).await.map(Some)
            }
            other => Ok(other),
        }
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError> {
        let mut url = self.endpoint("auth/v1/recover")?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);

        let request = self
            .anonymous(self.client.post(url))
            .json(&json!({ "email": email }));
        send(request).await?;

        info!(email, "Password reset requested");
        Ok(())
    }

    async fn update_user(&self, attributes: UserAttributes) -> Result<User, BackendError> {
        let session = self
            .get_session()
            .await?
            .ok_or(BackendError::SessionMissing)?;

        let url = self.endpoint("auth/v1/user")?;
        let request = self
            .client
            .put(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .json(&attributes);
        let user: User = decode(send(request).await?).await?;

        let refreshed = Session {
            user: user.clone(),
            ..session
        };
        self.set_session(Some(refreshed)).await?;
        Ok(user)
    }

    async fn admin_update_user_by_id(
        &self,
        user_id: UserId,
        attributes: AdminUserAttributes,
    ) -> Result<User, BackendError> {
        let Some(service_key) = &self.service_role_key else {
            warn!("Admin user update attempted without a service role key");
            return Err(BackendError::Config(
                "supabase.service_role_key is required for admin operations".to_string(),
            ));
        };

        let url = self.endpoint(&format!("auth/v1/admin/users/{user_id}"))?;
        let request = self
            .client
            .put(url)
            .header("apikey", service_key)
            .bearer_auth(service_key)
            .json(&attributes);
        decode(send(request).await?).await
    }
}
