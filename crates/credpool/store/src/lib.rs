//! Inventory store for the credpool engine.
//!
//! `InventoryStore` owns one ledger pair per category and serializes every
//! mutating operation per category with an exclusive lock; categories are
//! independent, so draws against different categories never contend.
//! `Dispenser` (see `dispense`) runs the pick-random-and-archive
//! transaction on top of the same locks.

#![deny(unsafe_code)]

mod dispense;
mod error;

pub use dispense::Dispenser;
pub use error::InventoryError;

use chrono::Utc;
use credpool_ledger::RecordLedger;
use credpool_types::{ArchivedRecord, CategoryId, PoolRecord, RecordText};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Durable inventory of available and dispensed records, one pool per
/// category.
///
/// The category set is fixed at `open`: configured categories unioned with
/// pools discovered in the backing store. Operations against anything else
/// return `UnknownCategory`.
pub struct InventoryStore {
    pub(crate) ledger: Arc<dyn RecordLedger>,
    categories: BTreeMap<CategoryId, Arc<RwLock<()>>>,
}

impl InventoryStore {
    /// Open the store: ensure configured categories exist, union in
    /// discovered pools, and reconcile any interrupted dispense.
    pub async fn open(
        ledger: Arc<dyn RecordLedger>,
        configured: &[CategoryId],
    ) -> Result<Self, InventoryError> {
        let mut names: HashSet<CategoryId> = configured.iter().cloned().collect();
        for category in ledger.discover_categories().await? {
            names.insert(category);
        }
        let mut categories = BTreeMap::new();
        for category in names {
            ledger.ensure_category(&category).await?;
            categories.insert(category, Arc::new(RwLock::new(())));
        }

        let store = Self { ledger, categories };
        store.reconcile().await?;
        info!(categories = store.categories.len(), "inventory store opened");
        Ok(store)
    }

    /// Finish or discard a dispense interrupted by a crash.
    ///
    /// A dispense records a durable intent, appends to the archive, rewrites
    /// the pool, then clears the intent. A leftover intent pins down the one
    /// row in flight: if its archive append landed and the picked row is
    /// still in the pool, that row alone is removed (the archive wins); in
    /// every other state the pool is left untouched. Duplicate records and
    /// re-contributed accounts are never disturbed.
    async fn reconcile(&self) -> Result<(), InventoryError> {
        for (category, lock) in &self.categories {
            let _guard = lock.write().await;
            let Some(intent) = self.ledger.dispense_intent(category).await? else {
                continue;
            };
            let archive = self.ledger.read_archive(category).await?;
            if archive.contains(&intent.archived()) {
                let mut pool = self.ledger.read_pool(category).await?;
                if let Some(index) = pool.iter().position(|record| *record == intent.record) {
                    pool.remove(index);
                    warn!(
                        category = %category,
                        "removed pool record left by an interrupted dispense"
                    );
                    self.ledger.replace_pool(category, &pool).await?;
                }
            } else {
                warn!(
                    category = %category,
                    "discarded dispense intent that never reached the archive"
                );
            }
            self.ledger.clear_dispense_intent(category).await?;
        }
        Ok(())
    }

    pub(crate) fn category_lock(
        &self,
        category: &CategoryId,
    ) -> Result<&Arc<RwLock<()>>, InventoryError> {
        self.categories
            .get(category)
            .ok_or_else(|| InventoryError::UnknownCategory(category.to_string()))
    }

    /// Validate and durably add one record; returns the new available count.
    pub async fn add(
        &self,
        category: &CategoryId,
        raw_record: &str,
        contributor: &str,
    ) -> Result<usize, InventoryError> {
        let account = RecordText::parse(raw_record)?;
        let lock = self.category_lock(category)?;
        let _guard = lock.write().await;

        let record = PoolRecord::new(account, contributor, Utc::now());
        self.ledger.append_pool(category, &record).await?;
        let count = self.ledger.read_pool(category).await?.len();
        debug!(category = %category, count, contributor, "record added");
        Ok(count)
    }

    /// Snapshot of the available pool, insertion order preserved.
    pub async fn list(&self, category: &CategoryId) -> Result<Vec<PoolRecord>, InventoryError> {
        let lock = self.category_lock(category)?;
        let _guard = lock.read().await;
        Ok(self.ledger.read_pool(category).await?)
    }

    /// Number of available records; 0 for an empty known category.
    pub async fn count(&self, category: &CategoryId) -> Result<usize, InventoryError> {
        Ok(self.list(category).await?.len())
    }

    /// Audit snapshot of the archive log, oldest first.
    pub async fn archive(
        &self,
        category: &CategoryId,
    ) -> Result<Vec<ArchivedRecord>, InventoryError> {
        let lock = self.category_lock(category)?;
        let _guard = lock.read().await;
        Ok(self.ledger.read_archive(category).await?)
    }

    /// All known categories, sorted.
    pub fn categories(&self) -> Vec<CategoryId> {
        self.categories.keys().cloned().collect()
    }
}
