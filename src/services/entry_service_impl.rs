//! Backend-agnostic implementation of the `EntryService` trait.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clients::backend::{Direction, Filter, Query, TableBackend};
use crate::domain::{EntryId, UserId};
use crate::models::{Entry, EntryFilters, EntryPatch, MethodHours, MethodTotals, NewEntry};
use crate::services::entry_service::{
    ENTRIES_TABLE, EntryError, EntryService, SIGNATURES_TABLE, aggregate_totals, present,
};

#[derive(Clone)]
pub struct RemoteEntryService {
    tables: Arc<dyn TableBackend>,
}

impl RemoteEntryService {
    #[must_use]
    pub fn new(tables: Arc<dyn TableBackend>) -> Self {
        Self { tables }
    }

    fn entries_for(user_id: UserId) -> Query {
        Query::table(ENTRIES_TABLE).eq("user_id", user_id)
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, EntryError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(EntryError::from))
        .collect()
}

#[async_trait]
impl EntryService for RemoteEntryService {
    async fn user_entries(&self, user_id: UserId) -> Result<Vec<Entry>, EntryError> {
        let query = Self::entries_for(user_id).order("entry_date", Direction::Desc);
        decode_rows(self.tables.select(&query).await?)
    }

    async fn entry(&self, entry_id: EntryId) -> Result<Entry, EntryError> {
        let query = Query::table(ENTRIES_TABLE).eq("id", entry_id);
        let row = self.tables.select_single(&query).await?;
        Ok(serde_json::from_value(row)?)
    }

    async fn create_entry(&self, entry: NewEntry) -> Result<Entry, EntryError> {
        let row = serde_json::to_value(&entry)?;
        let inserted = self.tables.insert(ENTRIES_TABLE, vec![row]).await?;

        let entry: Entry = decode_rows(inserted)?
            .into_iter()
            .next()
            .ok_or(EntryError::EmptyResponse)?;

        info!(entry_id = %entry.id, method = ?entry.method, "Created entry");
        Ok(entry)
    }

    async fn update_entry(
        &self,
        entry_id: EntryId,
        patch: EntryPatch,
    ) -> Result<Option<Entry>, EntryError> {
        let patch = serde_json::to_value(&patch)?;
        let updated = self
            .tables
            .update(ENTRIES_TABLE, &[Filter::eq("id", entry_id)], patch)
            .await?;

        Ok(decode_rows(updated)?.into_iter().next())
    }

    async fn delete_entry(&self, entry_id: EntryId) -> Result<(), EntryError> {
        let by_entry = [Filter::eq("entry_id", entry_id)];

        let signatures = self
            .tables
            .select(&Query::table(SIGNATURES_TABLE).select("id").eq("entry_id", entry_id))
            .await?;

        if !signatures.is_empty() {
            self.tables.delete(SIGNATURES_TABLE, &by_entry).await?;
            debug!(%entry_id, count = signatures.len(), "Deleted entry signatures");
        }

        self.tables
            .delete(ENTRIES_TABLE, &[Filter::eq("id", entry_id)])
            .await?;

        info!(%entry_id, signatures = signatures.len(), "Deleted entry");
        Ok(())
    }

    async fn totals_by_method(&self, user_id: UserId) -> Result<MethodTotals, EntryError> {
        let query = Self::entries_for(user_id).select("method, hours");
        let rows: Vec<MethodHours> = decode_rows(self.tables.select(&query).await?)?;
        Ok(aggregate_totals(rows))
    }

    async fn filtered_entries(
        &self,
        user_id: UserId,
        filters: &EntryFilters,
    ) -> Result<Vec<Entry>, EntryError> {
        let mut query = Self::entries_for(user_id);

        if let Some(method) = present(filters.method.as_ref()) {
            query = query.eq("method", method);
        }

        if let Some(company) = present(filters.company.as_ref()) {
            query = query.eq("company", company);
        }

        if let Some(from) = filters.date_from {
            query = query.gte("entry_date", from);
        }

        if let Some(to) = filters.date_to {
            query = query.lte("entry_date", to);
        }

        let query = query.order("entry_date", Direction::Desc);
        decode_rows(self.tables.select(&query).await?)
    }

    async fn has_signature(&self, entry_id: EntryId) -> Result<bool, EntryError> {
        // Limit to one row so several signatures do not trip the single-row check.
        let query = Query::table(SIGNATURES_TABLE)
            .select("id")
            .eq("entry_id", entry_id)
            .limit(1);

        match self.tables.select_single(&query).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
