//! The dispensing transaction: pick one record uniformly at random, remove
//! it from the available pool, and append it to the archive as a single
//! serialized step per category.

use crate::{InventoryError, InventoryStore};
use chrono::Utc;
use credpool_types::{ArchivedRecord, CategoryId, DispenseIntent};
use rand::Rng;
use std::sync::Arc;
use tracing::info;

/// Dispenses records from a shared inventory store.
///
/// Thin wrapper: the store owns the per-category locks, so adds and draws
/// against the same category share one critical section.
pub struct Dispenser {
    store: Arc<InventoryStore>,
}

impl Dispenser {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }

    /// Draw one record at random and move it to the archive.
    ///
    /// Holds the category's exclusive lock across the whole
    /// read-select-archive-rewrite sequence. A durable intent marker
    /// brackets the archive append and the pool rewrite; a crash inside the
    /// bracket is repaired by startup reconciliation, so the record lands
    /// in exactly one log.
    pub async fn dispense(&self, category: &CategoryId) -> Result<ArchivedRecord, InventoryError> {
        let lock = self.store.category_lock(category)?;
        let _guard = lock.write().await;

        let mut pool = self.store.ledger.read_pool(category).await?;
        if pool.is_empty() {
            return Err(InventoryError::Empty(category.clone()));
        }

        let index = rand::thread_rng().gen_range(0..pool.len());
        let picked = pool.remove(index);
        let intent = DispenseIntent::new(picked, Utc::now());
        let archived = intent.archived();

        let ledger = &self.store.ledger;
        ledger.record_dispense_intent(category, &intent).await?;
        ledger.append_archive(category, &archived).await?;
        ledger.replace_pool(category, &pool).await?;
        ledger.clear_dispense_intent(category).await?;

        info!(category = %category, remaining = pool.len(), "record dispensed");
        Ok(archived)
    }
}
