use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Filter};
use ethers::utils::to_checksum;
use log::{debug, error};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

use crate::dex_provider::{BlockBound, DexProvider, ProviderError};
use crate::enums::{log_prefix, Chain, Dex, LiquidityPool};
use crate::messages::{Transaction, TransactionEvent};
use crate::settings::Settings;
use crate::validator::{self, EventSignatures, ValidationError};

/// Pair-contract events emitted by PulseX pools, as `(name, topic0)`.
pub const PULSEX_EVENT_SIGNATURES: EventSignatures = EventSignatures::new(&[
    ("Approval", "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925"),
    ("Burn", "0x9f3761f1dbc9bb1a40d880a8871ee4bf6433f55c4a03283a07b323fa4173c6c3"),
    ("Mint", "0xdbba30eb0402b389513e87f51f4db2db80bed454384ec6925a24097c3548a02a"),
    ("Swap", "0xd78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822"),
    ("Transfer", "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"),
    ("Sync", "0x1c411e9a96e071241c2f21f7726b17ae89e3cab4c78be50e062b03a9fffbbad1"),
]);

pub struct PulseXProvider {
    chain: Chain,
    liquidity_pool: LiquidityPool,
    contract_address: Address,
    checksum_address: String,
    max_events_block_diff: u64,
    client: Arc<Provider<Http>>,
    log_prefix: String,
}

impl PulseXProvider {
    /// Resolves endpoint, contract address and window size from `settings`. Activity of the
    /// pool is checked by the factory before this is called.
    pub fn new(settings: &Settings, chain: Chain, liquidity_pool: LiquidityPool) -> Result<Self, ProviderError> {
        let dex = Dex::PulseX;
        let chain_settings = settings
            .chain(chain)
            .ok_or_else(|| ProviderError::Misconfigured(format!("chain {} is not configured", chain)))?;
        let dex_settings = settings
            .dex(chain, dex)
            .ok_or_else(|| ProviderError::Misconfigured(format!("dex {} is not configured on {}", dex, chain)))?;
        let pool_settings = settings.pool(chain, dex, liquidity_pool).ok_or_else(|| {
            ProviderError::Misconfigured(format!("pool {} is not configured on {}/{}", liquidity_pool, chain, dex))
        })?;

        let contract_address = Address::from_str(&pool_settings.contract_address).map_err(|e| {
            ProviderError::Misconfigured(format!(
                "invalid contract address `{}` for pool {}: {}",
                pool_settings.contract_address, liquidity_pool, e
            ))
        })?;
        let client = Provider::<Http>::try_from(chain_settings.validator_node_url.as_str()).map_err(|e| {
            ProviderError::Misconfigured(format!(
                "invalid validator node url `{}`: {}",
                chain_settings.validator_node_url, e
            ))
        })?;

        Ok(Self {
            chain,
            liquidity_pool,
            contract_address,
            checksum_address: to_checksum(&contract_address, None),
            max_events_block_diff: dex_settings.max_events_block_diff,
            client: Arc::new(client),
            log_prefix: log_prefix(chain, dex, liquidity_pool, "PROVIDER"),
        })
    }
}

#[async_trait]
impl DexProvider for PulseXProvider {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn dex(&self) -> Dex {
        Dex::PulseX
    }

    fn liquidity_pool(&self) -> LiquidityPool {
        self.liquidity_pool
    }

    fn contract_address(&self) -> &str {
        &self.checksum_address
    }

    fn max_events_block_diff(&self) -> u64 {
        self.max_events_block_diff
    }

    async fn get_transaction_events(
        &self,
        from_block: BlockBound,
        to_block: BlockBound,
    ) -> Result<Vec<TransactionEvent>, ProviderError> {
        let filter = Filter::new()
            .address(self.contract_address)
            .from_block(from_block)
            .to_block(to_block);

        let response: Vec<Value> = self
            .client
            .request("eth_getLogs", [filter])
            .await
            .map_err(|e| {
                let msg = format!(
                    "Unable to get contract events (contract_address={}, from_block={}, to_block={}). Error: {}",
                    self.checksum_address, from_block, to_block, e
                );
                error!("{} {}.", self.log_prefix, msg);
                ProviderError::Unavailable(msg)
            })?;
        debug!("{} eth_getLogs returned {} raw entries.", self.log_prefix, response.len());

        validator::validate_transaction_events(&response, &PULSEX_EVENT_SIGNATURES).map_err(|e| {
            error!(
                "{} Unable to validate events data (from_block={}, to_block={}). Error: {}.",
                self.log_prefix, from_block, to_block, e
            );
            ProviderError::DataInvalid(e)
        })
    }

    async fn get_transaction(&self, transaction_hash: &str) -> Result<Transaction, ProviderError> {
        let response: Value = self
            .client
            .request("eth_getTransactionByHash", [transaction_hash])
            .await
            .map_err(|e| {
                let msg = format!(
                    "Unable to get transaction (contract_address={}, transaction_hash={}). Error: {}",
                    self.checksum_address, transaction_hash, e
                );
                error!("{} {}.", self.log_prefix, msg);
                ProviderError::Unavailable(msg)
            })?;

        if response.is_null() {
            error!("{} Transaction {} not found on node.", self.log_prefix, transaction_hash);
            return Err(ValidationError::new("<root>", format!("transaction {} not found", transaction_hash)).into());
        }

        validator::validate_transaction(&response).map_err(|e| {
            error!(
                "{} Unable to validate transaction data (transaction_hash={}). Error: {}.",
                self.log_prefix, transaction_hash, e
            );
            ProviderError::DataInvalid(e)
        })
    }

    async fn get_latest_block_number(&self) -> Result<u64, ProviderError> {
        self.client
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| {
                let msg = format!("Unable to get latest block number. Error: {}", e);
                error!("{} {}.", self.log_prefix, msg);
                ProviderError::Unavailable(msg)
            })
    }

    async fn get_block_hash(&self, block_number: u64) -> Result<String, ProviderError> {
        let block = self.client.get_block(block_number).await.map_err(|e| {
            let msg = format!("Unable to get block {}. Error: {}", block_number, e);
            error!("{} {}.", self.log_prefix, msg);
            ProviderError::Unavailable(msg)
        })?;

        block
            .and_then(|b| b.hash)
            .map(|hash| format!("{:?}", hash))
            .ok_or_else(|| ValidationError::new("blockHash", format!("block {} has no hash yet", block_number)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::keccak256;

    fn topic_of(signature: &str) -> String {
        format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
    }

    #[test]
    fn test_standard_pair_signatures() {
        for (name, signature) in [
            ("Approval", "Approval(address,address,uint256)"),
            ("Transfer", "Transfer(address,address,uint256)"),
            ("Sync", "Sync(uint112,uint112)"),
            ("Swap", "Swap(address,uint256,uint256,uint256,uint256,address)"),
        ] {
            assert_eq!(PULSEX_EVENT_SIGNATURES.signature_of(name), Some(topic_of(signature).as_str()));
        }
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let upper = "0xDDF252AD1BE2C89B69C2B068FC378DAA952BA7F163C4A11628F55A4DF523B3EF";
        assert_eq!(PULSEX_EVENT_SIGNATURES.resolve(upper), Some("Transfer"));
        assert_eq!(PULSEX_EVENT_SIGNATURES.resolve("0x00"), None);
    }

    #[test]
    fn test_new_resolves_configuration() {
        let settings = Settings::from_toml_str(
            r#"
            [chains.pulse]
            validator_node_url = "http://127.0.0.1:8545"
            [chains.pulse.dexes.pulsex]
            max_events_block_diff = 250
            [chains.pulse.dexes.pulsex.pools.wpls_dai]
            contract_address = "0xe56043671df55de5cdf8459710433c10324de0ae"
            "#,
        )
        .unwrap();

        let provider = PulseXProvider::new(&settings, Chain::Pulse, LiquidityPool::WplsDai).unwrap();
        assert_eq!(provider.contract_address(), "0xE56043671df55dE5CDf8459710433C10324DE0aE");
        assert_eq!(provider.max_events_block_diff(), 250);
        assert_eq!(provider.dex(), Dex::PulseX);

        assert!(matches!(
            PulseXProvider::new(&settings, Chain::Pulse, LiquidityPool::HexWpls),
            Err(ProviderError::Misconfigured(_))
        ));
    }
}
