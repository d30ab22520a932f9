use credpool_ledger::StorageError;
use credpool_types::{CategoryId, CategoryParseError, RecordParseError};
use thiserror::Error;

/// Inventory-level errors.
///
/// `InvalidFormat`, `InvalidCategory`, `UnknownCategory`, and `Empty` are
/// expected, recoverable conditions; `Storage` is a fault that aborts the
/// surrounding transaction with prior state unchanged.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("invalid record format: {0}")]
    InvalidFormat(#[from] RecordParseError),

    #[error("invalid category name: {0}")]
    InvalidCategory(#[from] CategoryParseError),

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("no records available for {0}")]
    Empty(CategoryId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
