//! Credpool service facade.
//!
//! Wires the session gate in front of the inventory store and dispenser.
//! Every inventory operation takes the caller identity and performs an
//! explicit gate check before delegating; there is no decorator magic.

#![deny(unsafe_code)]

mod config;
pub mod render;

pub use config::PoolConfig;

use credpool_ledger::{CsvLedger, RecordLedger};
use credpool_session::{Session, SessionError, SessionGate};
use credpool_store::{Dispenser, InventoryError, InventoryStore};
use credpool_types::{ArchivedRecord, CategoryId};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// The credential pool service.
pub struct PoolService {
    gate: SessionGate,
    store: Arc<InventoryStore>,
    dispenser: Dispenser,
}

impl std::fmt::Debug for PoolService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolService").finish_non_exhaustive()
    }
}

impl PoolService {
    /// Bootstrap the file-backed service: create the data directory and
    /// header-only ledger files on first use, discover existing pools, and
    /// reconcile any interrupted dispense.
    pub async fn bootstrap(config: PoolConfig) -> Result<Self, ServiceError> {
        let ledger = CsvLedger::open(&config.data_dir).map_err(InventoryError::from)?;
        info!(data_dir = %config.data_dir.display(), "pool service starting");
        Self::with_ledger(Arc::new(ledger), &config).await
    }

    /// Build the service over an explicit ledger backend.
    pub async fn with_ledger(
        ledger: Arc<dyn RecordLedger>,
        config: &PoolConfig,
    ) -> Result<Self, ServiceError> {
        let mut configured = Vec::new();
        for name in &config.categories {
            let category = CategoryId::parse(name)
                .map_err(|e| ServiceError::Config(format!("invalid category {name:?}: {e}")))?;
            configured.push(category);
        }
        let store = Arc::new(InventoryStore::open(ledger, &configured).await?);
        let dispenser = Dispenser::new(Arc::clone(&store));
        let gate = SessionGate::new(config.passphrases.iter().cloned());
        Ok(Self {
            gate,
            store,
            dispenser,
        })
    }

    // ============ Session operations ============

    pub fn login(
        &self,
        identity: &str,
        display_name: &str,
        secret: &str,
    ) -> Result<Session, ServiceError> {
        let session = self.gate.login(identity, display_name, secret)?;
        info!(identity, display_name, "login");
        Ok(session)
    }

    pub fn logout(&self, identity: &str) -> Result<(), ServiceError> {
        self.gate.logout(identity)?;
        info!(identity, "logout");
        Ok(())
    }

    pub fn is_authenticated(&self, identity: &str) -> bool {
        self.gate.is_authenticated(identity)
    }

    // ============ Inventory operations (gated) ============

    /// Add a record; the contributor recorded is the session's display
    /// name. Returns the new available count.
    pub async fn add(
        &self,
        identity: &str,
        category: &str,
        raw_record: &str,
    ) -> Result<usize, ServiceError> {
        let session = self.authorize(identity)?;
        let count = self
            .store
            .add(&parse_category(category)?, raw_record, &session.display_name)
            .await?;
        Ok(count)
    }

    /// Draw one record at random and move it to the archive.
    pub async fn dispense(
        &self,
        identity: &str,
        category: &str,
    ) -> Result<ArchivedRecord, ServiceError> {
        self.authorize(identity)?;
        Ok(self.dispenser.dispense(&parse_category(category)?).await?)
    }

    pub async fn count(&self, identity: &str, category: &str) -> Result<usize, ServiceError> {
        self.authorize(identity)?;
        Ok(self.store.count(&parse_category(category)?).await?)
    }

    /// Audit view of a category's archive log.
    pub async fn archive(
        &self,
        identity: &str,
        category: &str,
    ) -> Result<Vec<ArchivedRecord>, ServiceError> {
        self.authorize(identity)?;
        Ok(self.store.archive(&parse_category(category)?).await?)
    }

    pub fn list_categories(&self, identity: &str) -> Result<Vec<CategoryId>, ServiceError> {
        self.authorize(identity)?;
        Ok(self.store.categories())
    }

    fn authorize(&self, identity: &str) -> Result<Session, ServiceError> {
        self.gate
            .session(identity)
            .ok_or(ServiceError::NotAuthenticated)
    }
}

fn parse_category(name: &str) -> Result<CategoryId, ServiceError> {
    Ok(CategoryId::parse(name).map_err(InventoryError::from)?)
}

/// Service-level errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// Whether the error is an internal fault (storage, lock) rather than
    /// an expected caller-facing condition.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Inventory(InventoryError::Storage(_)) | Self::Session(SessionError::LockError)
        )
    }
}
