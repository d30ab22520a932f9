use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for ledger operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Ledger-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o failure on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("corrupt store file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn corrupt(path: &Path, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}
