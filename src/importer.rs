//! # Liquidity Pool Importer
//!
//! Incrementally copies one pool's events and transactions from a [`DexProvider`] into a
//! [`LedgerStore`], resuming from the watermark held in a [`CheckpointStore`].
//!
//! ## Run
//!
//! 1. Read the checkpoint for (chain, dex, pool). None means the pool was never bootstrapped
//!    and the run ends without doing anything.
//! 2. `from = checkpoint.block_number`, `to = provider.get_latest_block_number()`.
//! 3. Walk windows of `max_events_block_diff` blocks from `from` until the cursor passes `to`
//!    (at least one window is always fetched). For every event, fetch the owning transaction
//!    on first sight of its hash and record both through [`LedgerStore::record_event`].
//! 4. Only after every window succeeded, set the checkpoint to `to`.
//!
//! Any failure aborts the run and leaves the checkpoint untouched, so the next run re-fetches
//! from the old watermark. Rows written before the failure stay; dedup on
//! `transaction_hash` and `(transaction, log_index)` absorbs the overlap.

use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::dex_provider::{DexProvider, ProviderError};
use crate::enums::{log_prefix, Chain, Dex, LiquidityPool};
use crate::models::{CheckpointKey, CheckpointRecord};
use crate::store::{CheckpointStore, LedgerStore, StoreError};
use crate::utils::{block_windows, Window};

#[derive(Debug, thiserror::Error)]
pub enum WindowFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ImporterError {
    #[error("checkpoint access failed for {key}: {source}")]
    Checkpoint {
        key: CheckpointKey,
        #[source]
        source: StoreError,
    },
    #[error("unable to get latest block number: {0}")]
    ChainHead(#[source] ProviderError),
    #[error("unable to resolve hash of block {block_number}: {source}")]
    BlockReference {
        block_number: u64,
        #[source]
        source: ProviderError,
    },
    #[error(
        "unable to import liquidity provider data for block range (from_block={from_block}, to_block={to_block}): {cause}"
    )]
    Window {
        from_block: u64,
        to_block: u64,
        #[source]
        cause: WindowFailure,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub from_block: u64,
    pub to_block: u64,
    pub windows: usize,
    pub events_fetched: usize,
    pub transactions_created: usize,
    pub events_created: usize,
    /// False when the chain head was behind the checkpoint and nothing was written.
    pub checkpoint_advanced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// No checkpoint exists; the pool must be bootstrapped first.
    NoCheckpoint,
    Completed(ImportSummary),
}

pub struct LiquidityPoolImporter {
    provider: Arc<dyn DexProvider>,
    checkpoints: Arc<dyn CheckpointStore>,
    ledger: Arc<dyn LedgerStore>,
    log_prefix: String,
}

impl LiquidityPoolImporter {
    pub fn new(
        provider: Arc<dyn DexProvider>,
        checkpoints: Arc<dyn CheckpointStore>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        let log_prefix = log_prefix(
            provider.chain(),
            provider.dex(),
            provider.liquidity_pool(),
            "LIQUIDITY-POOL-IMPORTER",
        );
        Self { provider, checkpoints, ledger, log_prefix }
    }

    pub fn checkpoint_key(&self) -> CheckpointKey {
        CheckpointKey::new(self.provider.chain(), self.provider.dex(), self.provider.liquidity_pool())
    }

    pub async fn import_liquidity_provider_data(&self) -> Result<ImportOutcome, ImporterError> {
        let key = self.checkpoint_key();
        let checkpoint = self
            .checkpoints
            .get_checkpoint(&key)
            .await
            .map_err(|source| ImporterError::Checkpoint { key, source })?;

        let Some(checkpoint) = checkpoint else {
            info!(
                "{} No block reference found. Please create initial block reference.",
                self.log_prefix
            );
            return Ok(ImportOutcome::NoCheckpoint);
        };

        let from_block = checkpoint.block_number;
        let to_block = self.provider.get_latest_block_number().await.map_err(|e| {
            error!("{} Unable to read chain head. Error: {}.", self.log_prefix, e);
            ImporterError::ChainHead(e)
        })?;
        info!(
            "{} Importing all liquidity provider data (from_block={}, to_block={}, block_diff={}).",
            self.log_prefix,
            from_block,
            to_block,
            to_block as i128 - from_block as i128
        );

        let mut summary = ImportSummary { from_block, to_block, ..Default::default() };
        for window in block_windows(from_block, to_block, self.provider.max_events_block_diff()) {
            if let Err(cause) = self.import_window(window, &mut summary).await {
                let err = ImporterError::Window { from_block: window.start, to_block: window.last_block(), cause };
                error!("{} {}.", self.log_prefix, err);
                return Err(err);
            }
            summary.windows += 1;
        }

        if to_block < from_block {
            warn!(
                "{} Chain head {} is behind block reference {}. Leaving block reference (id={}) unchanged.",
                self.log_prefix, to_block, from_block, checkpoint.id
            );
            return Ok(ImportOutcome::Completed(summary));
        }

        self.checkpoints
            .set_checkpoint_block_number(&key, to_block)
            .await
            .map_err(|source| {
                error!("{} Unable to advance block reference. Error: {}.", self.log_prefix, source);
                ImporterError::Checkpoint { key, source }
            })?;
        summary.checkpoint_advanced = true;

        info!(
            "{} Imported all liquidity provider data (from_block={}, to_block={}, events_created={}, transactions_created={}). \
             Set block reference (id={}) to current block number '{}'.",
            self.log_prefix,
            from_block,
            to_block,
            summary.events_created,
            summary.transactions_created,
            checkpoint.id,
            to_block
        );
        Ok(ImportOutcome::Completed(summary))
    }

    async fn import_window(&self, window: Window, summary: &mut ImportSummary) -> Result<(), WindowFailure> {
        info!(
            "{} Batch importing liquidity provider data (from_block={}, to_block={}).",
            self.log_prefix,
            window.start,
            window.last_block()
        );
        let transaction_events = self
            .provider
            .get_transaction_events(window.start.into(), window.last_block().into())
            .await?;
        info!("{} Fetched {} transaction events to import.", self.log_prefix, transaction_events.len());
        summary.events_fetched += transaction_events.len();

        for event in &transaction_events {
            let detail = match self.ledger.find_transaction(&event.transaction_hash).await? {
                Some(_) => None,
                None => Some(self.provider.get_transaction(&event.transaction_hash).await?),
            };

            let outcome = self.ledger.record_event(event, detail.as_ref()).await?;
            if outcome.transaction_created {
                summary.transactions_created += 1;
                info!(
                    "{} Imported new transaction (id={}, transaction_hash={}).",
                    self.log_prefix, outcome.transaction.id, outcome.transaction.transaction_hash
                );
            }
            if outcome.event_created {
                summary.events_created += 1;
                info!(
                    "{} Imported new event (event_id={}, transaction_id={}, name={}).",
                    self.log_prefix, outcome.event.id, outcome.transaction.id, outcome.event.name
                );
            } else {
                debug!(
                    "{} Event already imported (event_id={}, log_index={}).",
                    self.log_prefix, outcome.event.id, outcome.event.log_index
                );
            }
        }

        info!(
            "{} Batch imported liquidity provider data (from_block={}, to_block={}).",
            self.log_prefix,
            window.start,
            window.last_block()
        );
        Ok(())
    }
}

/// Seeds the checkpoint for the provider's pool at `block_number`, or at the chain head when
/// `None`. Returns `None` when a checkpoint already exists; it is never overwritten.
pub async fn bootstrap_checkpoint(
    provider: &dyn DexProvider,
    checkpoints: &dyn CheckpointStore,
    block_number: Option<u64>,
) -> Result<Option<CheckpointRecord>, ImporterError> {
    let prefix = log_prefix(provider.chain(), provider.dex(), provider.liquidity_pool(), "BLOCK-REFERENCE");
    let key = CheckpointKey::new(provider.chain(), provider.dex(), provider.liquidity_pool());

    if let Some(existing) = checkpoints
        .get_checkpoint(&key)
        .await
        .map_err(|source| ImporterError::Checkpoint { key, source })?
    {
        warn!(
            "{} Block reference already exists (id={}, block_number={}). Not overwriting.",
            prefix, existing.id, existing.block_number
        );
        return Ok(None);
    }

    let block_number = match block_number {
        Some(n) => n,
        None => provider.get_latest_block_number().await.map_err(ImporterError::ChainHead)?,
    };
    let block_hash = provider
        .get_block_hash(block_number)
        .await
        .map_err(|source| ImporterError::BlockReference { block_number, source })?;

    let created = checkpoints
        .create_checkpoint(&key, block_number, &block_hash)
        .await
        .map_err(|source| ImporterError::Checkpoint { key, source })?;
    match &created {
        Some(record) => info!(
            "{} Created block reference (id={}, block_number={}, block_hash={}).",
            prefix, record.id, record.block_number, record.block_hash
        ),
        None => warn!("{} Block reference was created concurrently. Not overwriting.", prefix),
    }
    Ok(created)
}

/// Why one pool of a multi-pool run did not import.
#[derive(Debug, thiserror::Error)]
pub enum PoolFailure {
    #[error("unable to create dex provider: {0}")]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Import(#[from] ImporterError),
}

const CONTINUOUS_LOG_PREFIX: &str = "[IMPORT-CONTINUOUS-LIQUIDITY-PROVIDER-DATA]";

/// Imports every pool in `pools`, one after another.
///
/// A pool whose provider cannot be built or whose run fails is logged and skipped; the
/// remaining pools still run. The per-pool results are returned in input order.
pub async fn import_all_pools<F>(
    chain: Chain,
    dex: Dex,
    pools: &[LiquidityPool],
    make_provider: F,
    checkpoints: Arc<dyn CheckpointStore>,
    ledger: Arc<dyn LedgerStore>,
) -> Vec<(LiquidityPool, Result<ImportOutcome, PoolFailure>)>
where
    F: Fn(LiquidityPool) -> Result<Arc<dyn DexProvider>, ProviderError>,
{
    info!(
        "{} Found {} liquidity pools for which to import data (chain={}, dex={}, liquidity_pools={:?}).",
        CONTINUOUS_LOG_PREFIX,
        pools.len(),
        chain,
        dex,
        pools.iter().map(|p| p.label()).collect::<Vec<_>>()
    );

    let mut results = Vec::with_capacity(pools.len());
    for &pool in pools {
        let provider = match make_provider(pool) {
            Ok(provider) => provider,
            Err(e) => {
                error!(
                    "{} Unable to create dex provider (chain={}, dex={}, liquidity_pool={}). Error: {}. Continue.",
                    CONTINUOUS_LOG_PREFIX, chain, dex, pool, e
                );
                results.push((pool, Err(PoolFailure::Provider(e))));
                continue;
            }
        };

        let importer = LiquidityPoolImporter::new(provider, Arc::clone(&checkpoints), Arc::clone(&ledger));
        match importer.import_liquidity_provider_data().await {
            Ok(outcome) => results.push((pool, Ok(outcome))),
            Err(e) => {
                error!("{} {}. Continue.", log_prefix(chain, dex, pool, "LIQUIDITY-POOL-IMPORTER"), e);
                results.push((pool, Err(PoolFailure::Import(e))));
            }
        }
    }
    results
}
