//! Scripted provider shared by the integration tests.
//!
//! Serves raw `eth_getLogs` / `eth_getTransactionByHash` payloads from memory and runs them
//! through the real validator, so tests exercise the same normalization as the node path.

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::Address;
use ethers::utils::to_checksum;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use lp_importer::adapters::pulsex::PULSEX_EVENT_SIGNATURES;
use lp_importer::dex_provider::{BlockBound, DexProvider, ProviderError};
use lp_importer::enums::{Chain, Dex, LiquidityPool};
use lp_importer::messages::{Transaction, TransactionEvent};
use lp_importer::validator;

pub const POOL_ADDRESS: &str = "0xe56043671df55de5cdf8459710433c10324de0ae";

/// EIP-55 form of `raw`, as the validator renders addresses.
pub fn checksummed(raw: &str) -> String {
    to_checksum(&raw.parse::<Address>().unwrap(), None)
}

pub fn tx_hash(n: u64) -> String {
    format!("0x{:064x}", n)
}

pub fn block_hash(n: u64) -> String {
    format!("0x{:064x}", n + 0xb10c)
}

pub fn swap_log(block_number: u64, tx: u64, log_index: u64) -> Value {
    log_with_topic(block_number, tx, log_index, PULSEX_EVENT_SIGNATURES.signature_of("Swap").unwrap_or_default())
}

pub fn log_with_topic(block_number: u64, tx: u64, log_index: u64, topic0: &str) -> Value {
    json!({
        "address": POOL_ADDRESS,
        "topics": [topic0],
        "data": "0x00000000000000000000000000000000000000000000000000000000000003e8",
        "blockNumber": format!("0x{:x}", block_number),
        "transactionHash": tx_hash(tx),
        "logIndex": format!("0x{:x}", log_index),
        "removed": false,
    })
}

pub fn transaction_json(tx: u64, block_number: u64) -> Value {
    json!({
        "hash": tx_hash(tx),
        "transactionIndex": "0x0",
        "blockNumber": format!("0x{:x}", block_number),
        "blockHash": block_hash(block_number),
        "from": "0x8ba1f109551bd432803012645ac136ddd64dba72",
        "to": "0x165c3410fc91ef562c50559f7d2289febed552d9",
        "gas": "0x30d40",
        "gasPrice": "0x2540be400",
        "nonce": "0x1",
    })
}

pub struct ScriptedProvider {
    liquidity_pool: LiquidityPool,
    contract_address: String,
    head: Mutex<u64>,
    max_window: u64,
    logs: Mutex<Vec<(u64, Value)>>,
    transactions: Mutex<HashMap<String, Value>>,
    failing_windows: Mutex<HashSet<u64>>,
    head_unavailable: Mutex<bool>,
    window_calls: Mutex<Vec<(u64, u64)>>,
    transaction_fetches: AtomicUsize,
    events_gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedProvider {
    pub fn new(head: u64, max_window: u64) -> Self {
        Self {
            liquidity_pool: LiquidityPool::WplsDai,
            contract_address: checksummed(POOL_ADDRESS),
            head: Mutex::new(head),
            max_window,
            logs: Mutex::new(Vec::new()),
            transactions: Mutex::new(HashMap::new()),
            failing_windows: Mutex::new(HashSet::new()),
            head_unavailable: Mutex::new(false),
            window_calls: Mutex::new(Vec::new()),
            transaction_fetches: AtomicUsize::new(0),
            events_gate: Mutex::new(None),
        }
    }

    pub fn for_pool(mut self, liquidity_pool: LiquidityPool) -> Self {
        self.liquidity_pool = liquidity_pool;
        self
    }

    /// Adds a swap log and, unless already present, its transaction.
    pub fn add_swap(&self, block_number: u64, tx: u64, log_index: u64) {
        self.add_log(block_number, swap_log(block_number, tx, log_index));
        self.transactions
            .lock()
            .unwrap()
            .entry(tx_hash(tx))
            .or_insert_with(|| transaction_json(tx, block_number));
    }

    pub fn add_log(&self, block_number: u64, raw: Value) {
        self.logs.lock().unwrap().push((block_number, raw));
    }

    pub fn add_transaction(&self, tx: u64, raw: Value) {
        self.transactions.lock().unwrap().insert(tx_hash(tx), raw);
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }

    pub fn fail_window_starting_at(&self, block_number: u64) {
        self.failing_windows.lock().unwrap().insert(block_number);
    }

    pub fn heal(&self) {
        self.failing_windows.lock().unwrap().clear();
        *self.head_unavailable.lock().unwrap() = false;
    }

    /// Every events query waits for a notification on `gate` before answering.
    pub fn hold_events_until(&self, gate: Arc<Notify>) {
        *self.events_gate.lock().unwrap() = Some(gate);
    }

    pub fn make_head_unavailable(&self) {
        *self.head_unavailable.lock().unwrap() = true;
    }

    /// Inclusive `(from, to)` of every events query, in call order.
    pub fn window_calls(&self) -> Vec<(u64, u64)> {
        self.window_calls.lock().unwrap().clone()
    }

    pub fn clear_window_calls(&self) {
        self.window_calls.lock().unwrap().clear();
    }

    pub fn transaction_fetches(&self) -> usize {
        self.transaction_fetches.load(Ordering::SeqCst)
    }
}

fn height(bound: BlockBound, head: u64) -> u64 {
    match bound {
        BlockBound::Earliest => 0,
        BlockBound::Latest => head,
        BlockBound::Number(n) => n,
    }
}

#[async_trait]
impl DexProvider for ScriptedProvider {
    fn chain(&self) -> Chain {
        Chain::Pulse
    }

    fn dex(&self) -> Dex {
        Dex::PulseX
    }

    fn liquidity_pool(&self) -> LiquidityPool {
        self.liquidity_pool
    }

    fn contract_address(&self) -> &str {
        &self.contract_address
    }

    fn max_events_block_diff(&self) -> u64 {
        self.max_window
    }

    async fn get_transaction_events(
        &self,
        from_block: BlockBound,
        to_block: BlockBound,
    ) -> Result<Vec<TransactionEvent>, ProviderError> {
        let gate = self.events_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let head = *self.head.lock().unwrap();
        let (from, to) = (height(from_block, head), height(to_block, head));
        self.window_calls.lock().unwrap().push((from, to));

        if self.failing_windows.lock().unwrap().contains(&from) {
            return Err(ProviderError::Unavailable(format!("scripted failure for window starting at {}", from)));
        }

        let raw: Vec<Value> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|(block, _)| (from..=to).contains(block))
            .map(|(_, log)| log.clone())
            .collect();
        Ok(validator::validate_transaction_events(&raw, &PULSEX_EVENT_SIGNATURES)?)
    }

    async fn get_transaction(&self, transaction_hash: &str) -> Result<Transaction, ProviderError> {
        self.transaction_fetches.fetch_add(1, Ordering::SeqCst);
        let raw = self
            .transactions
            .lock()
            .unwrap()
            .get(transaction_hash)
            .cloned()
            .unwrap_or(Value::Null);
        Ok(validator::validate_transaction(&raw)?)
    }

    async fn get_latest_block_number(&self) -> Result<u64, ProviderError> {
        if *self.head_unavailable.lock().unwrap() {
            return Err(ProviderError::Unavailable("scripted head failure".to_string()));
        }
        Ok(*self.head.lock().unwrap())
    }

    async fn get_block_hash(&self, block_number: u64) -> Result<String, ProviderError> {
        Ok(block_hash(block_number))
    }
}
