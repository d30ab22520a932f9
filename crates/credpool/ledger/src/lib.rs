//! Durable record ledgers for the credpool inventory engine.
//!
//! Each category owns a ledger pair: an ordered log of available records
//! and an append-only log of dispensed records. The `RecordLedger` trait
//! hides the backend; `CsvLedger` is the file-backed production adapter
//! and `MemoryLedger` the deterministic test adapter.
//!
//! Design stance:
//! - appends are all-or-nothing and fsynced before they return
//! - the archive log is never rewritten or truncated
//! - a dispense brackets its two writes with a durable intent marker so
//!   recovery can finish or discard exactly that dispense
//! - corrupt store files fail loudly; nothing is skipped or repaired here

#![deny(unsafe_code)]

mod error;
mod file;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::CsvLedger;
pub use memory::MemoryLedger;

use async_trait::async_trait;
use credpool_types::{ArchivedRecord, CategoryId, DispenseIntent, PoolRecord};

/// Storage interface for one ledger pair per category.
///
/// Callers must `ensure_category` before reading or appending; the
/// inventory store guarantees this at startup.
#[async_trait]
pub trait RecordLedger: Send + Sync {
    /// Create header-only pool and archive stores if absent.
    async fn ensure_category(&self, category: &CategoryId) -> StorageResult<()>;

    /// Enumerate categories with a persisted pool store.
    async fn discover_categories(&self) -> StorageResult<Vec<CategoryId>>;

    /// Snapshot of the available pool, insertion order preserved.
    async fn read_pool(&self, category: &CategoryId) -> StorageResult<Vec<PoolRecord>>;

    /// Durably append one record to the available pool.
    async fn append_pool(&self, category: &CategoryId, record: &PoolRecord) -> StorageResult<()>;

    /// Atomically replace the whole available pool.
    async fn replace_pool(
        &self,
        category: &CategoryId,
        records: &[PoolRecord],
    ) -> StorageResult<()>;

    /// Snapshot of the archive log, oldest first.
    async fn read_archive(&self, category: &CategoryId) -> StorageResult<Vec<ArchivedRecord>>;

    /// Durably append one record to the archive log.
    async fn append_archive(
        &self,
        category: &CategoryId,
        record: &ArchivedRecord,
    ) -> StorageResult<()>;

    /// Durably record the intent to dispense one picked record, before the
    /// archive append. At most one intent per category exists at a time.
    async fn record_dispense_intent(
        &self,
        category: &CategoryId,
        intent: &DispenseIntent,
    ) -> StorageResult<()>;

    /// The intent left behind by an interrupted dispense, if any.
    async fn dispense_intent(&self, category: &CategoryId)
        -> StorageResult<Option<DispenseIntent>>;

    /// Remove the intent once the dispense is fully applied. Clearing an
    /// absent intent is a no-op.
    async fn clear_dispense_intent(&self, category: &CategoryId) -> StorageResult<()>;
}
