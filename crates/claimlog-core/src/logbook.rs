use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::catalog::{Catalog, ConditionDefinition, ValidationError};
use crate::entry::{LogData, LogEntry};
use crate::export::{export_json, ExportError};
use crate::store::{LogStore, StoreError};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Unknown condition: {0}")]
    UnknownCondition(String),
    #[error("Log entry not found: {0}")]
    NotFound(String),
    #[error("Invalid log data: {0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImportMode {
    /// Keep existing entries, add imported ones whose id is new.
    Merge,
    /// Replace the whole collection.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub added: usize,
    pub skipped: usize,
    pub total: usize,
}

/// CRUD over a [`LogStore`], validating data against the condition catalog.
pub struct LogBook<S: LogStore> {
    store: S,
    catalog: Catalog,
}

impl<S: LogStore> LogBook<S> {
    pub fn new(store: S, catalog: Catalog) -> Self {
        Self { store, catalog }
    }

    pub fn with_builtin_catalog(store: S) -> Self {
        Self::new(store, Catalog::builtin().clone())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn entries(&self) -> Result<Vec<LogEntry>, LogError> {
        Ok(self.store.load()?)
    }

    pub fn get(&self, id: &str) -> Result<Option<LogEntry>, LogError> {
        Ok(self.entries()?.into_iter().find(|entry| entry.id == id))
    }

    pub fn create(&self, condition_id: &str, data: LogData) -> Result<LogEntry, LogError> {
        self.create_at(condition_id, data, Utc::now())
    }

    /// Create with an explicit timestamp (imports, backfilled logs).
    pub fn create_at(
        &self,
        condition_id: &str,
        mut data: LogData,
        timestamp: DateTime<Utc>,
    ) -> Result<LogEntry, LogError> {
        let condition = self.condition(condition_id)?;
        condition.normalize(&mut data);
        condition.validate(&data)?;
        let mut entries = self.store.load()?;
        let entry = LogEntry::new(condition_id, data, timestamp);
        entries.push(entry.clone());
        self.store.save_all(&entries)?;
        info!(id = %entry.id, condition = condition_id, "created log entry");
        Ok(entry)
    }

    /// Replace the data of an existing entry. Unknown ids are an error.
    pub fn update(&self, id: &str, mut new_data: LogData) -> Result<LogEntry, LogError> {
        let mut entries = self.store.load()?;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| LogError::NotFound(id.to_string()))?;
        let condition = self.condition(&entry.condition_id)?;
        condition.normalize(&mut new_data);
        condition.validate(&new_data)?;
        entry.data = new_data;
        let updated = entry.clone();
        self.store.save_all(&entries)?;
        info!(id, "updated log entry");
        Ok(updated)
    }

    /// Remove an entry. Returns false (and leaves storage untouched) when the
    /// id is unknown, so repeated deletes are harmless.
    pub fn delete(&self, id: &str) -> Result<bool, LogError> {
        let mut entries = self.store.load()?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.store.save_all(&entries)?;
        info!(id, "deleted log entry");
        Ok(true)
    }

    pub fn export_all(&self) -> Result<String, LogError> {
        let entries = self.entries()?;
        Ok(export_json(&entries)?)
    }

    pub fn import(
        &self,
        mut imported: Vec<LogEntry>,
        mode: ImportMode,
    ) -> Result<ImportReport, LogError> {
        for entry in &mut imported {
            let condition = self.condition(&entry.condition_id)?;
            condition.normalize(&mut entry.data);
            condition.validate(&entry.data)?;
        }
        let mut entries = match mode {
            ImportMode::Merge => self.store.load()?,
            ImportMode::Replace => Vec::new(),
        };
        let mut known: HashSet<String> = entries.iter().map(|entry| entry.id.clone()).collect();
        let mut added = 0;
        let mut skipped = 0;
        for entry in imported {
            if known.insert(entry.id.clone()) {
                entries.push(entry);
                added += 1;
            } else {
                skipped += 1;
            }
        }
        self.store.save_all(&entries)?;
        info!(added, skipped, "imported log entries");
        Ok(ImportReport {
            added,
            skipped,
            total: entries.len(),
        })
    }

    fn condition(&self, id: &str) -> Result<&ConditionDefinition, LogError> {
        self.catalog
            .get(id)
            .ok_or_else(|| LogError::UnknownCondition(id.to_string()))
    }
}
