//! Domain service for NDT hour entries.
//!
//! Covers listing, filtering, CRUD, per-method totals and the signature
//! cascade that has to run before an entry can be removed.

use thiserror::Error;

use crate::clients::backend::BackendError;
use crate::domain::{EntryId, UserId};
use crate::models::{Entry, EntryFilters, EntryPatch, MethodHours, MethodTotals, NewEntry};
use crate::parser::number::lenient_hours;

pub const ENTRIES_TABLE: &str = "ndt_entries";
pub const SIGNATURES_TABLE: &str = "ndt_signatures";

/// Errors specific to entry operations.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Unexpected entry shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend returned no representation for the written entry")]
    EmptyResponse,
}

impl EntryError {
    /// True when the backend reported that no row matched a single-row fetch.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(e) if e.is_not_found())
    }
}

/// Domain service trait for entries.
#[async_trait::async_trait]
pub trait EntryService: Send + Sync {
    /// Every entry of the user, newest `entry_date` first.
    async fn user_entries(&self, user_id: UserId) -> Result<Vec<Entry>, EntryError>;

    /// A single entry.
    ///
    /// # Errors
    ///
    /// Propagates [`BackendError::NotFound`] when the id matches nothing.
    async fn entry(&self, entry_id: EntryId) -> Result<Entry, EntryError>;

    async fn create_entry(&self, entry: NewEntry) -> Result<Entry, EntryError>;

    /// Applies a partial update. `None` when no row matched.
    async fn update_entry(
        &self,
        entry_id: EntryId,
        patch: EntryPatch,
    ) -> Result<Option<Entry>, EntryError>;

    /// Deletes the entry after deleting every signature that references it.
    ///
    /// A failure while looking up or deleting signatures leaves the entry in place.
    async fn delete_entry(&self, entry_id: EntryId) -> Result<(), EntryError>;

    /// Summed hours per method. Unreadable hours count as zero.
    async fn totals_by_method(&self, user_id: UserId) -> Result<MethodTotals, EntryError>;

    /// The user's entries narrowed by whichever filters are set, newest first.
    async fn filtered_entries(
        &self,
        user_id: UserId,
        filters: &EntryFilters,
    ) -> Result<Vec<Entry>, EntryError>;

    /// Whether at least one signature references the entry.
    async fn has_signature(&self, entry_id: EntryId) -> Result<bool, EntryError>;
}

/// Folds `method, hours` rows into per-method totals.
///
/// A method gets a key as soon as one row names it, even if that row adds
/// nothing. Rows without a method are grouped under `"null"`.
pub fn aggregate_totals(rows: impl IntoIterator<Item = MethodHours>) -> MethodTotals {
    let mut totals = MethodTotals::new();
    for row in rows {
        let method = row.method.unwrap_or_else(|| "null".to_string());
        *totals.entry(method).or_insert(0.0) += lenient_hours(&row.hours);
    }
    totals
}

/// Treats an empty string the same as an absent filter.
pub(crate) fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn row(method: Option<&str>, hours: Value) -> MethodHours {
        MethodHours {
            method: method.map(str::to_string),
            hours,
        }
    }

    #[test]
    fn aggregate_totals_ignores_unparsable_hours() {
        let totals = aggregate_totals(vec![
            row(Some("UT"), json!("2.5")),
            row(Some("UT"), json!("abc")),
            row(Some("RT"), json!("1")),
        ]);

        assert_eq!(totals.len(), 2);
        assert_eq!(totals["UT"], 2.5);
        assert_eq!(totals["RT"], 1.0);
    }

    #[test]
    fn aggregate_totals_creates_key_for_zero_contribution() {
        let totals = aggregate_totals(vec![row(Some("MT"), Value::Null)]);
        assert_eq!(totals.get("MT"), Some(&0.0));
    }

    #[test]
    fn aggregate_totals_mixes_numbers_and_strings() {
        let totals = aggregate_totals(vec![
            row(Some("PT"), json!(1.5)),
            row(Some("PT"), json!("2h")),
            row(None, json!(4)),
        ]);

        assert_eq!(totals["PT"], 3.5);
        assert_eq!(totals["null"], 4.0);
    }

    #[test]
    fn aggregate_totals_empty() {
        assert!(aggregate_totals(Vec::new()).is_empty());
    }

    #[test]
    fn empty_filter_value_is_absent() {
        let empty = String::new();
        let ut = "UT".to_string();
        assert_eq!(present(Some(&empty)), None);
        assert_eq!(present(None), None);
        assert_eq!(present(Some(&ut)), Some("UT"));
    }

    #[test]
    fn entry_error_display() {
        let err = EntryError::Backend(BackendError::SessionMissing);
        assert_eq!(err.to_string(), "Auth session missing");
        assert!(!err.is_not_found());

        let err = EntryError::Backend(BackendError::NotFound("no rows".into()));
        assert!(err.is_not_found());
    }
}
