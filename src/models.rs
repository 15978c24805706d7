use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::enums::{Chain, Dex, LiquidityPool};

/// Identifies one import watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheckpointKey {
    pub chain: Chain,
    pub dex: Dex,
    pub liquidity_pool: LiquidityPool,
}

impl CheckpointKey {
    pub fn new(chain: Chain, dex: Dex, liquidity_pool: LiquidityPool) -> Self {
        Self { chain, dex, liquidity_pool }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.chain, self.dex, self.liquidity_pool)
    }
}

/// Last fully-imported block height for a [`CheckpointKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRecord {
    pub id: i64,
    pub key: CheckpointKey,
    pub block_number: u64,
    /// Hash of the block the checkpoint was seeded at.
    pub block_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistedTransaction {
    pub id: i64,
    pub transaction_hash: String,
    pub transaction_index: i64,
    /// Pool contract whose event first referenced this transaction.
    pub contract_address: String,
    pub block_number: u64,
    pub block_hash: String,
    pub from_address: String,
    pub to_address: Option<String>,
    pub gas: String,
    pub gas_price: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistedEvent {
    pub id: i64,
    pub transaction_id: i64,
    pub name: String,
    pub topics: Vec<String>,
    pub data: String,
    pub log_index: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One event flattened with its owning transaction, as written to export artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub contract_address: String,
    pub event_name: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: u64,
    pub transaction_hash: String,
    pub transaction_index: i64,
    pub block_hash: String,
    pub log_index: i64,
    pub transaction_from_address: String,
    pub transaction_to_address: Option<String>,
    pub transaction_gas: String,
    pub transaction_gas_price: String,
}

impl ExportRecord {
    pub fn from_rows(transaction: &PersistedTransaction, event: &PersistedEvent) -> Self {
        Self {
            contract_address: transaction.contract_address.clone(),
            event_name: event.name.clone(),
            topics: event.topics.clone(),
            data: event.data.clone(),
            block_number: transaction.block_number,
            transaction_hash: transaction.transaction_hash.clone(),
            transaction_index: transaction.transaction_index,
            block_hash: transaction.block_hash.clone(),
            log_index: event.log_index,
            transaction_from_address: transaction.from_address.clone(),
            transaction_to_address: transaction.to_address.clone(),
            transaction_gas: transaction.gas.clone(),
            transaction_gas_price: transaction.gas_price.clone(),
        }
    }
}
