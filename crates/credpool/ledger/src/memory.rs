//! In-memory reference implementation of the record ledger.
//!
//! Deterministic and test-friendly; production deployments use the
//! file-backed `CsvLedger`.

use crate::error::{StorageError, StorageResult};
use crate::RecordLedger;
use async_trait::async_trait;
use credpool_types::{ArchivedRecord, CategoryId, DispenseIntent, PoolRecord};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Clone, Default)]
struct CategoryLogs {
    pool: Vec<PoolRecord>,
    archive: Vec<ArchivedRecord>,
    intent: Option<DispenseIntent>,
}

/// In-memory ledger adapter.
#[derive(Default)]
pub struct MemoryLedger {
    categories: RwLock<HashMap<CategoryId, CategoryLogs>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_logs<T>(
        &self,
        category: &CategoryId,
        f: impl FnOnce(&CategoryLogs) -> T,
    ) -> StorageResult<T> {
        let guard = self
            .categories
            .read()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;
        let logs = guard.get(category).ok_or_else(|| {
            StorageError::Backend(format!("category {category} not initialized"))
        })?;
        Ok(f(logs))
    }

    fn with_logs_mut<T>(
        &self,
        category: &CategoryId,
        f: impl FnOnce(&mut CategoryLogs) -> T,
    ) -> StorageResult<T> {
        let mut guard = self
            .categories
            .write()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;
        let logs = guard.get_mut(category).ok_or_else(|| {
            StorageError::Backend(format!("category {category} not initialized"))
        })?;
        Ok(f(logs))
    }
}

#[async_trait]
impl RecordLedger for MemoryLedger {
    async fn ensure_category(&self, category: &CategoryId) -> StorageResult<()> {
        let mut guard = self
            .categories
            .write()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;
        guard.entry(category.clone()).or_default();
        Ok(())
    }

    async fn discover_categories(&self) -> StorageResult<Vec<CategoryId>> {
        let guard = self
            .categories
            .read()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))?;
        let mut categories: Vec<_> = guard.keys().cloned().collect();
        categories.sort();
        Ok(categories)
    }

    async fn read_pool(&self, category: &CategoryId) -> StorageResult<Vec<PoolRecord>> {
        self.with_logs(category, |logs| logs.pool.clone())
    }

    async fn append_pool(&self, category: &CategoryId, record: &PoolRecord) -> StorageResult<()> {
        self.with_logs_mut(category, |logs| logs.pool.push(record.clone()))
    }

    async fn replace_pool(
        &self,
        category: &CategoryId,
        records: &[PoolRecord],
    ) -> StorageResult<()> {
        self.with_logs_mut(category, |logs| logs.pool = records.to_vec())
    }

    async fn read_archive(&self, category: &CategoryId) -> StorageResult<Vec<ArchivedRecord>> {
        self.with_logs(category, |logs| logs.archive.clone())
    }

    async fn append_archive(
        &self,
        category: &CategoryId,
        record: &ArchivedRecord,
    ) -> StorageResult<()> {
        self.with_logs_mut(category, |logs| logs.archive.push(record.clone()))
    }

    async fn record_dispense_intent(
        &self,
        category: &CategoryId,
        intent: &DispenseIntent,
    ) -> StorageResult<()> {
        self.with_logs_mut(category, |logs| logs.intent = Some(intent.clone()))
    }

    async fn dispense_intent(
        &self,
        category: &CategoryId,
    ) -> StorageResult<Option<DispenseIntent>> {
        self.with_logs(category, |logs| logs.intent.clone())
    }

    async fn clear_dispense_intent(&self, category: &CategoryId) -> StorageResult<()> {
        self.with_logs_mut(category, |logs| logs.intent = None)
    }
}
