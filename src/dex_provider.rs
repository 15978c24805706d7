//! # DEX Provider Capability
//!
//! The abstraction the importer drives to read a liquidity pool's on-chain history. One
//! implementation exists per (chain, DEX) pair; see [`crate::adapters`] for the factory that
//! selects it.
//!
//! Providers return normalized [`messages`](crate::messages): the raw node payload is always
//! passed through the [`validator`](crate::validator) before it leaves the provider.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lp_importer::dex_provider::{BlockBound, DexProvider};
//!
//! async fn tail(provider: &dyn DexProvider) -> anyhow::Result<()> {
//!     let head = provider.get_latest_block_number().await?;
//!     let events = provider
//!         .get_transaction_events(BlockBound::Number(head.saturating_sub(10)), BlockBound::Latest)
//!         .await?;
//!     for event in events {
//!         let tx = provider.get_transaction(&event.transaction_hash).await?;
//!         println!("{} in block {}", event.name, tx.block_number);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use ethers::types::{BlockNumber, U64};
use std::fmt;

use crate::enums::{Chain, Dex, LiquidityPool};
use crate::messages::{Transaction, TransactionEvent};
use crate::validator::ValidationError;

/// A block range bound: a concrete height or one of the node's symbolic tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockBound {
    Earliest,
    Latest,
    Number(u64),
}

impl From<u64> for BlockBound {
    fn from(n: u64) -> Self {
        BlockBound::Number(n)
    }
}

impl From<BlockBound> for BlockNumber {
    fn from(bound: BlockBound) -> Self {
        match bound {
            BlockBound::Earliest => BlockNumber::Earliest,
            BlockBound::Latest => BlockNumber::Latest,
            BlockBound::Number(n) => BlockNumber::Number(U64::from(n)),
        }
    }
}

impl fmt::Display for BlockBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockBound::Earliest => f.write_str("earliest"),
            BlockBound::Latest => f.write_str("latest"),
            BlockBound::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport or RPC failure talking to the node.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// The node answered, but the payload failed validation.
    #[error("provider data invalid: {0}")]
    DataInvalid(#[from] ValidationError),
    #[error("liquidity pool {pool} is not active on dex {dex} for chain {chain}")]
    Inactive { chain: Chain, dex: Dex, pool: LiquidityPool },
    #[error("dex {dex} is not supported on chain {chain}")]
    Unsupported { chain: Chain, dex: Dex },
    #[error("provider misconfigured: {0}")]
    Misconfigured(String),
}

/// Read access to one pool's events and transactions on one chain.
#[async_trait]
pub trait DexProvider: Send + Sync {
    fn chain(&self) -> Chain;

    fn dex(&self) -> Dex;

    fn liquidity_pool(&self) -> LiquidityPool;

    /// The pool's contract address, EIP-55 checksummed.
    fn contract_address(&self) -> &str;

    /// Largest block span fetched in one [`DexProvider::get_transaction_events`] call.
    fn max_events_block_diff(&self) -> u64;

    /// All logs emitted by the pool contract in the inclusive range `[from_block, to_block]`.
    async fn get_transaction_events(
        &self,
        from_block: BlockBound,
        to_block: BlockBound,
    ) -> Result<Vec<TransactionEvent>, ProviderError>;

    async fn get_transaction(&self, transaction_hash: &str) -> Result<Transaction, ProviderError>;

    /// Current chain head as seen by the node.
    async fn get_latest_block_number(&self) -> Result<u64, ProviderError>;

    /// Hash of the block at `block_number`, used when seeding a checkpoint.
    async fn get_block_hash(&self, block_number: u64) -> Result<String, ProviderError>;
}
