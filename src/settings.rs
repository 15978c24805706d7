use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

use crate::enums::{Chain, Dex, LiquidityPool};

pub const DEFAULT_CONFIG_PATH: &str = "Config.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    /// Falls back to `DATABASE_URL` when unset.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

fn default_max_connections() -> u32 {
    5
}
fn default_connect_attempts() -> u32 {
    10
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

impl DatabaseSettings {
    pub fn resolve_url(&self) -> Option<String> {
        self.url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| env::var("DATABASE_URL").ok())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoolSettings {
    pub contract_address: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct DexSettings {
    /// Upper bound on the block span of a single `eth_getLogs` query.
    pub max_events_block_diff: u64,
    #[serde(default)]
    pub pools: HashMap<String, PoolSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    pub validator_node_url: String,
    #[serde(default)]
    pub dexes: HashMap<String, DexSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub chains: HashMap<String, ChainSettings>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path(DEFAULT_CONFIG_PATH)
    }

    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        Self::finish(s.try_deserialize()?)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?;
        Self::finish(s.try_deserialize()?)
    }

    fn finish(mut settings: Settings) -> Result<Self, ConfigError> {
        // Per-chain RPC endpoint overrides, e.g. LP_IMPORTER_RPC_URL_PULSE
        for (key, chain) in settings.chains.iter_mut() {
            let var = format!("LP_IMPORTER_RPC_URL_{}", key.to_ascii_uppercase());
            if let Ok(url) = env::var(&var) {
                let trimmed = url.trim();
                if !trimmed.is_empty() {
                    chain.validator_node_url = trimmed.to_string();
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (chain_key, chain) in &self.chains {
            for (dex_key, dex) in &chain.dexes {
                if dex.max_events_block_diff == 0 {
                    return Err(ConfigError::Message(format!(
                        "chains.{}.dexes.{}.max_events_block_diff must be greater than zero",
                        chain_key, dex_key
                    )));
                }
                for pool_key in dex.pools.keys() {
                    if LiquidityPool::from_config_key(pool_key).is_none() {
                        return Err(ConfigError::Message(format!(
                            "chains.{}.dexes.{}.pools.{} is not a known liquidity pool",
                            chain_key, dex_key, pool_key
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn chain(&self, chain: Chain) -> Option<&ChainSettings> {
        self.chains.get(chain.config_key())
    }

    pub fn dex(&self, chain: Chain, dex: Dex) -> Option<&DexSettings> {
        self.chain(chain)?.dexes.get(dex.config_key())
    }

    pub fn pool(&self, chain: Chain, dex: Dex, pool: LiquidityPool) -> Option<&PoolSettings> {
        self.dex(chain, dex)?.pools.get(pool.config_key())
    }

    /// Pools configured for a (chain, dex), active or not, in enum order.
    pub fn pools_for(&self, chain: Chain, dex: Dex) -> Vec<LiquidityPool> {
        let mut pools: Vec<LiquidityPool> = self
            .dex(chain, dex)
            .map(|d| d.pools.keys().filter_map(|k| LiquidityPool::from_config_key(k)).collect())
            .unwrap_or_default();
        pools.sort();
        pools
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [database]
        max_connections = 3

        [chains.pulse]
        validator_node_url = "https://rpc.pulsechain.com"

        [chains.pulse.dexes.pulsex]
        max_events_block_diff = 1000

        [chains.pulse.dexes.pulsex.pools.wpls_usdt]
        contract_address = "0x322df7921f28f1146cdf62afdac0d6bc0ab80711"
        is_active = false

        [chains.pulse.dexes.pulsex.pools.wpls_dai]
        contract_address = "0xE56043671df55dE5CDf8459710433C10324DE0aE"
    "#;

    #[test]
    fn test_lookup_and_defaults() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.database.max_connections, 3);
        assert_eq!(settings.database.connect_attempts, 10);

        let dex = settings.dex(Chain::Pulse, Dex::PulseX).unwrap();
        assert_eq!(dex.max_events_block_diff, 1000);

        let pool = settings.pool(Chain::Pulse, Dex::PulseX, LiquidityPool::WplsDai).unwrap();
        assert!(pool.is_active);
        assert!(!settings.pool(Chain::Pulse, Dex::PulseX, LiquidityPool::WplsUsdt).unwrap().is_active);
        assert!(settings.pool(Chain::Eth, Dex::PulseX, LiquidityPool::WplsDai).is_none());
    }

    #[test]
    fn test_pools_for_is_enum_ordered() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            settings.pools_for(Chain::Pulse, Dex::PulseX),
            vec![LiquidityPool::WplsDai, LiquidityPool::WplsUsdt]
        );
        assert!(settings.pools_for(Chain::Pulse, Dex::Uniswap).is_empty());
    }

    #[test]
    fn test_zero_window_rejected() {
        let raw = r#"
            [chains.pulse]
            validator_node_url = "http://localhost:8545"
            [chains.pulse.dexes.pulsex]
            max_events_block_diff = 0
        "#;
        assert!(Settings::from_toml_str(raw).is_err());
    }

    #[test]
    fn test_unknown_pool_rejected() {
        let raw = r#"
            [chains.pulse]
            validator_node_url = "http://localhost:8545"
            [chains.pulse.dexes.pulsex]
            max_events_block_diff = 10
            [chains.pulse.dexes.pulsex.pools.doge_wpls]
            contract_address = "0x0000000000000000000000000000000000000001"
        "#;
        assert!(Settings::from_toml_str(raw).is_err());
    }
}
