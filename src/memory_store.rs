//! In-process implementations of the storage contracts.
//!
//! Enforce the same dedup keys as the PostgreSQL schema. Each store sits behind one mutex,
//! so a `record_event` call is atomic with respect to every other call on the same store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::messages::{Transaction, TransactionEvent};
use crate::models::{CheckpointKey, CheckpointRecord, ExportRecord, PersistedEvent, PersistedTransaction};
use crate::store::{CheckpointStore, LedgerStore, RecordOutcome, StoreError};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Integrity("store lock poisoned".to_string()))
}

#[derive(Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<HashMap<CheckpointKey, CheckpointRecord>>,
    writes: AtomicUsize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set_checkpoint_block_number` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get_checkpoint(&self, key: &CheckpointKey) -> Result<Option<CheckpointRecord>, StoreError> {
        Ok(lock(&self.records)?.get(key).cloned())
    }

    async fn set_checkpoint_block_number(&self, key: &CheckpointKey, block_number: u64) -> Result<(), StoreError> {
        let mut records = lock(&self.records)?;
        let record = records
            .get_mut(key)
            .ok_or_else(|| StoreError::Integrity(format!("no checkpoint exists for {}", key)))?;
        record.block_number = record.block_number.max(block_number);
        record.updated_at = Utc::now();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_checkpoint(
        &self,
        key: &CheckpointKey,
        block_number: u64,
        block_hash: &str,
    ) -> Result<Option<CheckpointRecord>, StoreError> {
        let mut records = lock(&self.records)?;
        if records.contains_key(key) {
            return Ok(None);
        }
        let now = Utc::now();
        let record = CheckpointRecord {
            id: records.len() as i64 + 1,
            key: *key,
            block_number,
            block_hash: block_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        records.insert(*key, record.clone());
        Ok(Some(record))
    }
}

#[derive(Default)]
struct Ledger {
    transactions: Vec<PersistedTransaction>,
    events: Vec<PersistedEvent>,
    transaction_by_hash: HashMap<String, usize>,
    event_by_key: HashMap<(i64, i64), usize>,
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    ledger: Mutex<Ledger>,
    record_calls: AtomicUsize,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_count(&self) -> usize {
        self.ledger.lock().map(|l| l.transactions.len()).unwrap_or_default()
    }

    pub fn event_count(&self) -> usize {
        self.ledger.lock().map(|l| l.events.len()).unwrap_or_default()
    }

    /// Number of `record_event` calls, whether or not they created rows.
    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    /// `(transaction_hash, log_index)` of every stored event, in insertion order.
    pub fn event_keys(&self) -> Vec<(String, i64)> {
        let Ok(ledger) = self.ledger.lock() else {
            return Vec::new();
        };
        ledger
            .events
            .iter()
            .filter_map(|e| {
                ledger
                    .transactions
                    .iter()
                    .find(|t| t.id == e.transaction_id)
                    .map(|t| (t.transaction_hash.clone(), e.log_index))
            })
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn find_transaction(&self, transaction_hash: &str) -> Result<Option<PersistedTransaction>, StoreError> {
        let ledger = lock(&self.ledger)?;
        Ok(ledger
            .transaction_by_hash
            .get(transaction_hash)
            .map(|&i| ledger.transactions[i].clone()))
    }

    async fn find_event(&self, transaction_id: i64, log_index: i64) -> Result<Option<PersistedEvent>, StoreError> {
        let ledger = lock(&self.ledger)?;
        Ok(ledger
            .event_by_key
            .get(&(transaction_id, log_index))
            .map(|&i| ledger.events[i].clone()))
    }

    async fn record_event(
        &self,
        event: &TransactionEvent,
        transaction: Option<&Transaction>,
    ) -> Result<RecordOutcome, StoreError> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = lock(&self.ledger)?;
        let ledger = &mut *guard;
        let now = Utc::now();

        let (tx_idx, transaction_created) = match ledger.transaction_by_hash.get(&event.transaction_hash) {
            Some(&i) => (i, false),
            None => {
                let detail = transaction.ok_or_else(|| {
                    StoreError::Integrity(format!(
                        "transaction {} is not stored and no detail was supplied",
                        event.transaction_hash
                    ))
                })?;
                if detail.transaction_hash != event.transaction_hash {
                    return Err(StoreError::Integrity(format!(
                        "transaction detail {} does not match event transaction {}",
                        detail.transaction_hash, event.transaction_hash
                    )));
                }
                let row = PersistedTransaction {
                    id: ledger.transactions.len() as i64 + 1,
                    transaction_hash: detail.transaction_hash.clone(),
                    transaction_index: detail.transaction_index,
                    contract_address: event.contract_address.clone(),
                    block_number: detail.block_number,
                    block_hash: detail.block_hash.clone(),
                    from_address: detail.from_address.clone(),
                    to_address: detail.to_address.clone(),
                    gas: detail.gas.to_string(),
                    gas_price: detail.gas_price.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                let i = ledger.transactions.len();
                ledger.transaction_by_hash.insert(row.transaction_hash.clone(), i);
                ledger.transactions.push(row);
                (i, true)
            }
        };
        let transaction_row = ledger.transactions[tx_idx].clone();

        let key = (transaction_row.id, event.log_index);
        let (event_idx, event_created) = match ledger.event_by_key.get(&key) {
            Some(&i) => (i, false),
            None => {
                let row = PersistedEvent {
                    id: ledger.events.len() as i64 + 1,
                    transaction_id: transaction_row.id,
                    name: event.name.clone(),
                    topics: event.topics.clone(),
                    data: event.data.clone(),
                    log_index: event.log_index,
                    created_at: now,
                    updated_at: now,
                };
                let i = ledger.events.len();
                ledger.event_by_key.insert(key, i);
                ledger.events.push(row);
                (i, true)
            }
        };

        Ok(RecordOutcome {
            transaction: transaction_row,
            event: ledger.events[event_idx].clone(),
            transaction_created,
            event_created,
        })
    }

    async fn events_for_contract(&self, contract_address: &str) -> Result<Vec<ExportRecord>, StoreError> {
        let ledger = lock(&self.ledger)?;
        let mut rows: Vec<(&PersistedTransaction, &PersistedEvent)> = ledger
            .events
            .iter()
            .filter_map(|e| {
                let t = ledger.transactions.get((e.transaction_id - 1) as usize)?;
                (t.contract_address == contract_address).then_some((t, e))
            })
            .collect();
        rows.sort_by_key(|(t, e)| (t.block_number, t.transaction_index, e.log_index));
        Ok(rows.into_iter().map(|(t, e)| ExportRecord::from_rows(t, e)).collect())
    }
}
