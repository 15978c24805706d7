//! Normalized records produced by the validator. Created per fetch and consumed immediately.

/// A single log emitted by the pool contract, identified by `(transaction_hash, log_index)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEvent {
    pub name: String,
    pub contract_address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub transaction_hash: String,
    pub log_index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub transaction_hash: String,
    pub transaction_index: i64,
    pub block_number: u64,
    pub block_hash: String,
    pub from_address: String,
    /// `None` for contract-creation transactions.
    pub to_address: Option<String>,
    pub gas: u128,
    pub gas_price: u128,
}
