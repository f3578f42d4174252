//! The seam between the services and whatever hosts the tables and the auth
//! subsystem.
//!
//! Services only ever talk to [`TableBackend`] and [`AuthBackend`]. The Supabase
//! client implements both over HTTP, [`MemoryBackend`](super::memory::MemoryBackend)
//! implements both in process.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::domain::UserId;
use crate::models::{AdminUserAttributes, AuthResponse, Session, User, UserAttributes};

/// Error body reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl ApiError {
    #[must_use]
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: Some(code.into()),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    /// Decodes a PostgREST (`code`, `message`) or GoTrue (`error_code`, `msg`,
    /// `error_description`) error body. Unknown shapes keep the raw text.
    #[must_use]
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed: Option<Map<String, Value>> = serde_json::from_str(body).ok();
        let Some(obj) = parsed else {
            return Self {
                status,
                code: None,
                message: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.to_string()
                },
                details: None,
                hint: None,
            };
        };

        let text = |key: &str| match obj.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let code = text("error_code").or_else(|| text("code"));
        let message = text("message")
            .or_else(|| text("msg"))
            .or_else(|| text("error_description"))
            .or_else(|| text("error"))
            .unwrap_or_else(|| format!("HTTP {status}"));

        Self {
            status,
            code,
            message,
            details: text("details"),
            hint: text("hint"),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code {code}, status {})", self.message, self.status),
            None => write!(f, "{} (status {})", self.message, self.status),
        }
    }
}

/// Failure of a remote call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A single-row fetch matched no row (or more than one).
    #[error("No rows returned: {0}")]
    NotFound(String),

    #[error("{0}")]
    Api(ApiError),

    #[error("Auth session missing")]
    SessionMissing,

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The remote error code, if the service reported one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api(err) => err.code.as_deref(),
            _ => None,
        }
    }
}

impl From<ApiError> for BackendError {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

impl FilterOp {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gte => "gte",
            Self::Lte => "lte",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    #[must_use]
    pub fn eq(column: &str, value: impl ToString) -> Self {
        Self {
            column: column.to_string(),
            op: FilterOp::Eq,
            value: value.to_string(),
        }
    }

    /// PostgREST rendering of the constraint, e.g. `("entry_date", "gte.2024-01-01")`.
    #[must_use]
    pub fn to_param(&self) -> (String, String) {
        (
            self.column.clone(),
            format!("{}.{}", self.op.as_str(), self.value),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// A select over one table: projection, conjunctive filters, ordering, limit.
///
/// ```rust
/// use ndt_hours::clients::backend::{Direction, Query};
///
/// let query = Query::table("ndt_entries")
///     .eq("user_id", "u1")
///     .gte("entry_date", "2024-01-01")
///     .order("entry_date", Direction::Desc);
///
/// assert_eq!(
///     query.to_params(),
///     vec![
///         ("select".to_string(), "*".to_string()),
///         ("user_id".to_string(), "eq.u1".to_string()),
///         ("entry_date".to_string(), "gte.2024-01-01".to_string()),
///         ("order".to_string(), "entry_date.desc".to_string()),
///     ]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    #[must_use]
    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Eq, value)
    }

    #[must_use]
    pub fn gte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Gte, value)
    }

    #[must_use]
    pub fn lte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Lte, value)
    }

    fn filter(mut self, column: &str, op: FilterOp, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op,
            value: value.to_string(),
        });
        self
    }

    #[must_use]
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            direction,
        });
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), remove_whitespace(&self.columns))];
        params.extend(self.filters.iter().map(Filter::to_param));

        if let Some(order) = &self.order {
            let dir = match order.direction {
                Direction::Asc => "asc",
                Direction::Desc => "desc",
            };
            params.push(("order".to_string(), format!("{}.{dir}", order.column)));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }
}

fn remove_whitespace(columns: &str) -> String {
    columns.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Table operations against the remote store.
#[async_trait::async_trait]
pub trait TableBackend: Send + Sync {
    /// Returns every row matching the query.
    async fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError>;

    /// Returns exactly one row.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] unless exactly one row matches.
    async fn select_single(&self, query: &Query) -> Result<Value, BackendError>;

    /// Inserts rows and returns their stored representation.
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError>;

    /// Applies `patch` to every row matching `filters` and returns the updated rows.
    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError>;

    /// Deletes every row matching `filters`.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), BackendError>;
}

/// The auth subsystem.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthResponse, BackendError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, BackendError>;

    /// Ends the current session. Signing out while signed out is not an error.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Fetches the signed-in user from the auth server.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::SessionMissing`] when nobody is signed in.
    async fn get_user(&self) -> Result<User, BackendError>;

    /// The current session, refreshed if it is about to expire.
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError>;

    async fn update_user(&self, attributes: UserAttributes) -> Result<User, BackendError>;

    async fn admin_update_user_by_id(
        &self,
        user_id: UserId,
        attributes: AdminUserAttributes,
    ) -> Result<User, BackendError>;
}
