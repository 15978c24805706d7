// DEX Providers Module
// One provider implementation per supported (chain, DEX); `create_provider` picks it.

pub mod pulsex;

use log::error;
use std::sync::Arc;

pub use crate::dex_provider::DexProvider;
use crate::dex_provider::ProviderError;
use crate::enums::{Chain, Dex, LiquidityPool};
use crate::settings::Settings;

const LOG_PREFIX: &str = "[DEX-PROVIDER-FACTORY]";

/// Builds the provider for `(chain, dex, liquidity_pool)`.
///
/// A pool that is missing from configuration or marked `is_active = false` is rejected here,
/// before any import work starts.
pub fn create_provider(
    settings: &Settings,
    chain: Chain,
    dex: Dex,
    liquidity_pool: LiquidityPool,
) -> Result<Arc<dyn DexProvider>, ProviderError> {
    let pool = settings.pool(chain, dex, liquidity_pool).ok_or_else(|| {
        let msg = format!(
            "Liquidity pool {} is not configured on dex {} for chain {}",
            liquidity_pool, dex, chain
        );
        error!("{} {}.", LOG_PREFIX, msg);
        ProviderError::Misconfigured(msg)
    })?;

    if !pool.is_active {
        let err = ProviderError::Inactive { chain, dex, pool: liquidity_pool };
        error!("{} {}.", LOG_PREFIX, err);
        return Err(err);
    }

    match dex {
        Dex::PulseX => Ok(Arc::new(pulsex::PulseXProvider::new(settings, chain, liquidity_pool)?)),
        Dex::Uniswap => {
            let err = ProviderError::Unsupported { chain, dex };
            error!("{} {}.", LOG_PREFIX, err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::from_toml_str(
            r#"
            [chains.pulse]
            validator_node_url = "http://127.0.0.1:8545"
            [chains.pulse.dexes.pulsex]
            max_events_block_diff = 100
            [chains.pulse.dexes.pulsex.pools.wpls_dai]
            contract_address = "0xE56043671df55dE5CDf8459710433C10324DE0aE"
            [chains.pulse.dexes.pulsex.pools.hex_wpls]
            contract_address = "0xf1f4ee610b2babb05c635f726ef8b0c568c8dc65"
            is_active = false
            [chains.pulse.dexes.uniswap]
            max_events_block_diff = 100
            [chains.pulse.dexes.uniswap.pools.wpls_dai]
            contract_address = "0xE56043671df55dE5CDf8459710433C10324DE0aE"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_active_pool_gets_provider() {
        let provider = create_provider(&settings(), Chain::Pulse, Dex::PulseX, LiquidityPool::WplsDai).unwrap();
        assert_eq!(provider.liquidity_pool(), LiquidityPool::WplsDai);
        assert_eq!(provider.chain(), Chain::Pulse);
    }

    #[test]
    fn test_inactive_pool_rejected() {
        let result = create_provider(&settings(), Chain::Pulse, Dex::PulseX, LiquidityPool::HexWpls);
        assert!(matches!(result, Err(ProviderError::Inactive { pool: LiquidityPool::HexWpls, .. })));
    }

    #[test]
    fn test_unsupported_dex_rejected() {
        let result = create_provider(&settings(), Chain::Pulse, Dex::Uniswap, LiquidityPool::WplsDai);
        assert!(matches!(result, Err(ProviderError::Unsupported { dex: Dex::Uniswap, .. })));
    }

    #[test]
    fn test_unconfigured_pool_rejected() {
        let result = create_provider(&settings(), Chain::Eth, Dex::PulseX, LiquidityPool::WplsDai);
        assert!(matches!(result, Err(ProviderError::Misconfigured(_))));
    }
}
