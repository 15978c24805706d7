//! Storage contracts consumed by the importer and exporter.
//!
//! [`CheckpointStore`] holds one watermark per (chain, dex, pool). [`LedgerStore`] holds the
//! append-only transaction/event ledger; its [`LedgerStore::record_event`] is the atomic unit
//! of the import loop.

use async_trait::async_trait;

use crate::messages::{Transaction, TransactionEvent};
use crate::models::{CheckpointKey, CheckpointRecord, ExportRecord, PersistedEvent, PersistedTransaction};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("integrity error: {0}")]
    Integrity(String),
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get_checkpoint(&self, key: &CheckpointKey) -> Result<Option<CheckpointRecord>, StoreError>;

    /// Raises the watermark height of an existing checkpoint as a single record write.
    ///
    /// The stored height never decreases: a lower `block_number` leaves it as is.
    async fn set_checkpoint_block_number(&self, key: &CheckpointKey, block_number: u64) -> Result<(), StoreError>;

    /// Seeds a checkpoint. Returns `None` when one already exists for `key`.
    async fn create_checkpoint(
        &self,
        key: &CheckpointKey,
        block_number: u64,
        block_hash: &str,
    ) -> Result<Option<CheckpointRecord>, StoreError>;
}

/// What [`LedgerStore::record_event`] found or created.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub transaction: PersistedTransaction,
    pub event: PersistedEvent,
    pub transaction_created: bool,
    pub event_created: bool,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_transaction(&self, transaction_hash: &str) -> Result<Option<PersistedTransaction>, StoreError>;

    async fn find_event(&self, transaction_id: i64, log_index: i64) -> Result<Option<PersistedEvent>, StoreError>;

    /// Persists `event`, and `transaction` if its hash is not stored yet, in one atomic unit.
    ///
    /// Rows already present under the dedup keys (`transaction_hash`, and
    /// `(transaction_id, log_index)`) are returned instead of duplicated. Fails with
    /// [`StoreError::Integrity`] when the owning transaction is neither stored nor supplied.
    async fn record_event(
        &self,
        event: &TransactionEvent,
        transaction: Option<&Transaction>,
    ) -> Result<RecordOutcome, StoreError>;

    /// Every stored event whose transaction belongs to `contract_address`, ordered by
    /// block, transaction index and log index.
    async fn events_for_contract(&self, contract_address: &str) -> Result<Vec<ExportRecord>, StoreError>;
}
