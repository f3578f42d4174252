//! In-process stand-in for the hosted backend.
//!
//! Rows live in a map of JSON arrays and users in a vector. Every call is
//! recorded (as `"select:ndt_signatures"`, `"auth:sign_out"`, ...), so callers
//! can assert on call order. Failures can be injected per call label.

use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::clients::backend::{
    ApiError, AuthBackend, BackendError, Direction, Filter, FilterOp, Query, TableBackend,
};
use crate::domain::UserId;
use crate::models::{AdminUserAttributes, AuthResponse, Session, User, UserAttributes};

const NO_ROWS_MESSAGE: &str = "JSON object requested, multiple (or no) rows returned";

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    accounts: Mutex<Vec<Account>>,
    session: Mutex<Option<Session>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, ApiError>>,
    password_resets: Mutex<Vec<(String, String)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `table` with `rows`, as if they were already stored.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        lock(&self.tables)
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// A snapshot of every row currently in `table`.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.tables).get(table).cloned().unwrap_or_default()
    }

    /// Registers a confirmed account without going through sign-up.
    pub fn add_user(&self, email: &str, password: &str, user_metadata: Map<String, Value>) -> User {
        let user = new_user(email, user_metadata);
        lock(&self.accounts).push(Account {
            user: user.clone(),
            password: password.to_string(),
        });
        user
    }

    #[must_use]
    pub fn user(&self, user_id: UserId) -> Option<User> {
        lock(&self.accounts)
            .iter()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
    }

    /// Makes the next and every later call labelled `label` fail with `error`.
    pub fn fail_on(&self, label: &str, error: ApiError) {
        lock(&self.failures).insert(label.to_string(), error);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// `(email, redirect_to)` pairs of every reset request.
    #[must_use]
    pub fn password_resets(&self) -> Vec<(String, String)> {
        lock(&self.password_resets).clone()
    }

    fn record(&self, label: String) -> Result<(), BackendError> {
        let failure = lock(&self.failures).get(&label).cloned();
        lock(&self.calls).push(label);
        failure.map_or(Ok(()), |err| Err(BackendError::Api(err)))
    }

    fn current_user_id(&self) -> Result<UserId, BackendError> {
        lock(&self.session)
            .as_ref()
            .map(|s| s.user.id)
            .ok_or(BackendError::SessionMissing)
    }

    fn open_session(&self, user: User) -> Session {
        let now = Utc::now();
        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            expires_at: Some(now.timestamp() + 3600),
            user,
        };
        *lock(&self.session) = Some(session.clone());
        session
    }
}

fn new_user(email: &str, user_metadata: Map<String, Value>) -> User {
    let now = Utc::now();
    User {
        id: UserId::random(),
        aud: Some("authenticated".to_string()),
        role: Some("authenticated".to_string()),
        email: Some(email.to_string()),
        user_metadata,
        app_metadata: Map::new(),
        email_confirmed_at: Some(now),
        last_sign_in_at: None,
        created_at: Some(now),
        updated_at: Some(now),
    }
}

/// Text form of a cell for comparison against a filter value.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "null".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Numbers compare numerically, everything else lexically (ISO dates sort correctly).
fn compare_text(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn row_matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| {
        let cell = row.get(&f.column);
        if matches!(cell, None | Some(Value::Null)) && f.op != FilterOp::Eq {
            return false;
        }
        let ord = compare_text(&cell_text(cell), &f.value);
        match f.op {
            FilterOp::Eq => ord == Ordering::Equal,
            FilterOp::Gte => ord != Ordering::Less,
            FilterOp::Lte => ord != Ordering::Greater,
        }
    })
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }

    let picked = columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| (c.to_string(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect();
    Value::Object(picked)
}

fn run_query(rows: &[Value], query: &Query) -> Vec<Value> {
    let mut selected: Vec<&Value> = rows.iter().filter(|r| row_matches(r, &query.filters)).collect();

    if let Some(order) = &query.order {
        selected.sort_by(|a, b| {
            let ord = compare_text(
                &cell_text(a.get(&order.column)),
                &cell_text(b.get(&order.column)),
            );
            match order.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
    }

    let limit = query.limit.unwrap_or(usize::MAX);
    selected
        .into_iter()
        .take(limit)
        .map(|r| project(r, &query.columns))
        .collect()
}

fn merge(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

#[async_trait::async_trait]
impl TableBackend for MemoryBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        self.record(format!("select:{}", query.table))?;
        let tables = lock(&self.tables);
        Ok(tables
            .get(&query.table)
            .map(|rows| run_query(rows, query))
            .unwrap_or_default())
    }

    async fn select_single(&self, query: &Query) -> Result<Value, BackendError> {
        self.record(format!("select_single:{}", query.table))?;
        let tables = lock(&self.tables);
        let mut rows = tables
            .get(&query.table)
            .map(|rows| run_query(rows, query))
            .unwrap_or_default();

        if rows.len() == 1 {
            Ok(rows.remove(0))
        } else {
            Err(BackendError::NotFound(NO_ROWS_MESSAGE.to_string()))
        }
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        self.record(format!("insert:{table}"))?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(mut obj) = row else {
                return Err(BackendError::Api(ApiError::new(
                    400,
                    "PGRST102",
                    "All object keys must match",
                )));
            };
            obj.entry("id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            obj.entry("created_at")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            stored.push(Value::Object(obj));
        }

        lock(&self.tables)
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        self.record(format!("update:{table}"))?;

        let Value::Object(patch) = patch else {
            return Err(BackendError::Api(ApiError::new(
                400,
                "PGRST102",
                "Update body must be an object",
            )));
        };

        let mut tables = lock(&self.tables);
        let mut updated = Vec::new();
        for row in tables.get_mut(table).into_iter().flatten() {
            if !row_matches(row, filters) {
                continue;
            }
            if let Value::Object(obj) = &mut *row {
                merge(obj, patch.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), BackendError> {
        self.record(format!("delete:{table}"))?;
        if let Some(rows) = lock(&self.tables).get_mut(table) {
            rows.retain(|row| !row_matches(row, filters));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthResponse, BackendError> {
        self.record("auth:sign_up".to_string())?;

        if lock(&self.accounts)
            .iter()
            .any(|a| a.user.email.as_deref() == Some(email))
        {
            return Err(BackendError::Api(ApiError::new(
                422,
                "user_already_exists",
                "User already registered",
            )));
        }

        let user = self.add_user(email, password, metadata);
        let session = self.open_session(user.clone());
        Ok(AuthResponse {
            user: Some(user),
            session: Some(session),
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, BackendError> {
        self.record("auth:sign_in_with_password".to_string())?;

        let user = lock(&self.accounts)
            .iter()
            .find(|a| a.user.email.as_deref() == Some(email) && a.password == password)
            .map(|a| a.user.clone())
            .ok_or_else(|| {
                BackendError::Api(ApiError::new(
                    400,
                    "invalid_credentials",
                    "Invalid login credentials",
                ))
            })?;

        let session = self.open_session(user.clone());
        Ok(AuthResponse {
            user: Some(user),
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        *lock(&self.session) = None;
        self.record("auth:sign_out".to_string())
    }

    async fn get_user(&self) -> Result<User, BackendError> {
        self.record("auth:get_user".to_string())?;
        let id = self.current_user_id()?;
        self.user(id).ok_or(BackendError::SessionMissing)
    }

    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        self.record("auth:get_session".to_string())?;
        Ok(lock(&self.session).clone())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError> {
        self.record("auth:reset_password_for_email".to_string())?;
        lock(&self.password_resets).push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn update_user(&self, attributes: UserAttributes) -> Result<User, BackendError> {
        self.record("auth:update_user".to_string())?;
        let id = self.current_user_id()?;

        let mut accounts = lock(&self.accounts);
        let account = accounts
            .iter_mut()
            .find(|a| a.user.id == id)
            .ok_or(BackendError::SessionMissing)?;

        if let Some(password) = attributes.password {
            account.password = password;
        }
        if let Some(email) = attributes.email {
            account.user.email = Some(email);
        }
        if let Some(data) = attributes.data {
            merge(&mut account.user.user_metadata, data);
        }
        account.user.updated_at = Some(Utc::now());
        Ok(account.user.clone())
    }

    async fn admin_update_user_by_id(
        &self,
        user_id: UserId,
        attributes: AdminUserAttributes,
    ) -> Result<User, BackendError> {
        self.record("auth:admin_update_user_by_id".to_string())?;

        let mut accounts = lock(&self.accounts);
        let account = accounts
            .iter_mut()
            .find(|a| a.user.id == user_id)
            .ok_or_else(|| {
                BackendError::Api(ApiError::new(404, "user_not_found", "User not found"))
            })?;

        if let Some(metadata) = attributes.user_metadata {
            merge(&mut account.user.user_metadata, metadata);
        }
        if let Some(metadata) = attributes.app_metadata {
            merge(&mut account.user.app_metadata, metadata);
        }
        account.user.updated_at = Some(Utc::now());
        Ok(account.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn select_filters_orders_and_projects() {
        let backend = MemoryBackend::new();
        backend.seed(
            "ndt_entries",
            vec![
                json!({"id": "a", "user_id": "u1", "entry_date": "2024-01-05", "hours": 2}),
                json!({"id": "b", "user_id": "u1", "entry_date": "2024-03-01", "hours": 3}),
                json!({"id": "c", "user_id": "u2", "entry_date": "2024-02-01", "hours": 4}),
            ],
        );

        let query = Query::table("ndt_entries")
            .select("id, hours")
            .eq("user_id", "u1")
            .order("entry_date", Direction::Desc);
        let rows = backend.select(&query).await.unwrap();

        assert_eq!(
            rows,
            vec![json!({"id": "b", "hours": 3}), json!({"id": "a", "hours": 2})]
        );
    }

    #[tokio::test]
    async fn select_single_requires_exactly_one_row() {
        let backend = MemoryBackend::new();
        backend.seed(
            "ndt_signatures",
            vec![
                json!({"id": "s1", "entry_id": "e1"}),
                json!({"id": "s2", "entry_id": "e1"}),
            ],
        );

        let none = Query::table("ndt_signatures").eq("entry_id", "e2");
        assert!(backend.select_single(&none).await.unwrap_err().is_not_found());

        let many = Query::table("ndt_signatures").eq("entry_id", "e1");
        assert!(backend.select_single(&many).await.unwrap_err().is_not_found());

        let limited = many.limit(1);
        assert!(backend.select_single(&limited).await.is_ok());
    }

    #[tokio::test]
    async fn range_filters_skip_null_cells() {
        let backend = MemoryBackend::new();
        backend.seed(
            "ndt_entries",
            vec![
                json!({"id": "a", "entry_date": null}),
                json!({"id": "b", "entry_date": "2024-06-30"}),
            ],
        );

        let query = Query::table("ndt_entries").lte("entry_date", "2024-06-30");
        let rows = backend.select(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "b");
    }

    #[tokio::test]
    async fn injected_failure_is_returned_and_recorded() {
        let backend = MemoryBackend::new();
        backend.fail_on("delete:ndt_entries", ApiError::new(500, "XX000", "boom"));

        let err = backend
            .delete("ndt_entries", &[Filter::eq("id", "a")])
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("XX000"));
        assert_eq!(backend.calls(), vec!["delete:ndt_entries".to_string()]);
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        let backend = MemoryBackend::new();
        backend.add_user("dana@example.com", "hunter22", Map::new());

        let err = backend
            .sign_in_with_password("dana@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("invalid_credentials"));

        let ok = backend
            .sign_in_with_password("dana@example.com", "hunter22")
            .await
            .unwrap();
        assert!(ok.session.is_some());
        assert!(backend.get_session().await.unwrap().is_some());
    }
}
