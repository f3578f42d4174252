use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::domain::{EntryId, UserId};
use crate::parser::date::parse_date_prefix;
use crate::parser::number::read_hours;

/// A logged block of hours worked under one inspection method.
///
/// Rows are passed through as stored: a null `method` or an unreadable
/// `entry_date` reads as `None` rather than failing the whole listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,

    pub user_id: UserId,

    #[serde(default)]
    pub method: Option<String>,

    /// `None` when the stored value is missing or not numeric.
    #[serde(default, deserialize_with = "deserialize_lenient_hours")]
    pub hours: Option<f64>,

    #[serde(default)]
    pub company: Option<String>,

    /// Date part of the stored value, which may be a date or a timestamp.
    #[serde(default, deserialize_with = "deserialize_lenient_date")]
    pub entry_date: Option<NaiveDate>,

    /// Any other columns the table carries.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Insert payload for `ndt_entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub user_id: UserId,
    pub method: String,
    pub hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub entry_date: NaiveDate,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial update for an entry. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntryPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.method.is_none()
            && self.hours.is_none()
            && self.company.is_none()
            && self.entry_date.is_none()
            && self.extra.is_empty()
    }
}

/// Optional narrowing for an entry listing. `None` and empty strings add no
/// constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilters {
    pub method: Option<String>,
    pub company: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// The `method, hours` projection used for totals.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodHours {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub hours: Value,
}

/// Summed hours keyed by method name.
pub type MethodTotals = BTreeMap<String, f64>;

fn deserialize_lenient_hours<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(read_hours(&value))
}

fn deserialize_lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_date_prefix))
}
