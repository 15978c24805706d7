//! Closed sets of chains, DEXes and liquidity pools the importer knows about.
//!
//! Every value has three spellings:
//! - a stable numeric id (persisted in the checkpoint table),
//! - an upper-case label used in log prefixes and on the command line (`PULSE`, `WPLS_stETH`),
//! - a lower-case configuration key (`pulse`, `wpls_steth`).

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
pub enum Chain {
    #[value(name = "PULSE")]
    Pulse,
    #[value(name = "ETH")]
    Eth,
}

impl Chain {
    pub fn id(&self) -> i32 {
        match self {
            Chain::Pulse => 1,
            Chain::Eth => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Chain::Pulse => "PULSE",
            Chain::Eth => "ETH",
        }
    }

    pub fn config_key(&self) -> &'static str {
        match self {
            Chain::Pulse => "pulse",
            Chain::Eth => "eth",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
pub enum Dex {
    #[value(name = "PULSEX")]
    PulseX,
    #[value(name = "UNISWAP")]
    Uniswap,
}

impl Dex {
    pub fn id(&self) -> i32 {
        match self {
            Dex::PulseX => 1,
            Dex::Uniswap => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dex::PulseX => "PULSEX",
            Dex::Uniswap => "UNISWAP",
        }
    }

    pub fn config_key(&self) -> &'static str {
        match self {
            Dex::PulseX => "pulsex",
            Dex::Uniswap => "uniswap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
pub enum LiquidityPool {
    #[value(name = "WPLS_DAI")]
    WplsDai,
    #[value(name = "USDC_WPLS")]
    UsdcWpls,
    #[value(name = "WPLS_USDT")]
    WplsUsdt,
    #[value(name = "WBTC_WPLS")]
    WbtcWpls,
    #[value(name = "WETH_WPLS")]
    WethWpls,
    #[value(name = "WPLS_stETH")]
    WplsStEth,
    #[value(name = "PLSX_WPLS")]
    PlsxWpls,
    #[value(name = "HEX_WPLS")]
    HexWpls,
}

impl LiquidityPool {
    pub const ALL: [LiquidityPool; 8] = [
        LiquidityPool::WplsDai,
        LiquidityPool::UsdcWpls,
        LiquidityPool::WplsUsdt,
        LiquidityPool::WbtcWpls,
        LiquidityPool::WethWpls,
        LiquidityPool::WplsStEth,
        LiquidityPool::PlsxWpls,
        LiquidityPool::HexWpls,
    ];

    pub fn id(&self) -> i32 {
        match self {
            LiquidityPool::WplsDai => 1,
            LiquidityPool::UsdcWpls => 2,
            LiquidityPool::WplsUsdt => 3,
            LiquidityPool::WbtcWpls => 4,
            LiquidityPool::WethWpls => 5,
            LiquidityPool::WplsStEth => 6,
            LiquidityPool::PlsxWpls => 7,
            LiquidityPool::HexWpls => 8,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LiquidityPool::WplsDai => "WPLS_DAI",
            LiquidityPool::UsdcWpls => "USDC_WPLS",
            LiquidityPool::WplsUsdt => "WPLS_USDT",
            LiquidityPool::WbtcWpls => "WBTC_WPLS",
            LiquidityPool::WethWpls => "WETH_WPLS",
            LiquidityPool::WplsStEth => "WPLS_stETH",
            LiquidityPool::PlsxWpls => "PLSX_WPLS",
            LiquidityPool::HexWpls => "HEX_WPLS",
        }
    }

    pub fn config_key(&self) -> &'static str {
        match self {
            LiquidityPool::WplsDai => "wpls_dai",
            LiquidityPool::UsdcWpls => "usdc_wpls",
            LiquidityPool::WplsUsdt => "wpls_usdt",
            LiquidityPool::WbtcWpls => "wbtc_wpls",
            LiquidityPool::WethWpls => "weth_wpls",
            LiquidityPool::WplsStEth => "wpls_steth",
            LiquidityPool::PlsxWpls => "plsx_wpls",
            LiquidityPool::HexWpls => "hex_wpls",
        }
    }

    /// Resolves a configuration key back to its pool.
    pub fn from_config_key(key: &str) -> Option<Self> {
        let key = key.to_ascii_lowercase();
        Self::ALL.into_iter().find(|pool| pool.config_key() == key)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Dex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for LiquidityPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Builds the `[CHAIN-DEX-POOL-COMPONENT]` tag carried by every scoped log line.
pub fn log_prefix(chain: Chain, dex: Dex, pool: LiquidityPool, component: &str) -> String {
    format!("[{}-{}-{}-{}]", chain.label(), dex.label(), pool.label(), component)
}
