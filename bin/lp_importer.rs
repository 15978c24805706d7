//! # LP Importer
//!
//! Command-line entry point for importing and exporting liquidity-pool data.
//!
//! ## Usage
//!
//! ```bash
//! # seed the checkpoint once per pool
//! cargo run --bin lp_importer -- bootstrap --chain PULSE --dex PULSEX --pool WPLS_DAI --block-number 17000000
//! # import every configured pool of a DEX (failures are logged, remaining pools still run)
//! cargo run --bin lp_importer -- import --chain PULSE --dex PULSEX
//! # import one pool, exiting non-zero on failure
//! cargo run --bin lp_importer -- import-pool --chain PULSE --dex PULSEX --pool WPLS_DAI
//! # dump everything imported for one pool
//! cargo run --bin lp_importer -- export --chain PULSE --dex PULSEX --pool WPLS_DAI --output-file wpls_dai.bin
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

use lp_importer::{
    adapters::create_provider,
    database::{self, PgStore},
    enums::{Chain, Dex, LiquidityPool},
    exporter::{self, LiquidityPoolExporter},
    importer::{self, ImportOutcome, LiquidityPoolImporter},
    settings::{Settings, DEFAULT_CONFIG_PATH},
    store::{CheckpointStore, LedgerStore},
};

#[derive(Parser, Debug)]
#[command(name = "lp_importer")]
#[command(about = "Import and export liquidity pool events", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import new events for every configured pool of a DEX
    Import {
        #[arg(long, value_enum)]
        chain: Chain,
        #[arg(long, value_enum)]
        dex: Dex,
    },
    /// Import new events for a single pool
    ImportPool {
        #[arg(long, value_enum)]
        chain: Chain,
        #[arg(long, value_enum)]
        dex: Dex,
        #[arg(long, value_enum)]
        pool: LiquidityPool,
    },
    /// Export all imported events of a pool to a file
    Export {
        #[arg(long, value_enum)]
        chain: Chain,
        #[arg(long, value_enum)]
        dex: Dex,
        #[arg(long, value_enum)]
        pool: LiquidityPool,
        #[arg(long)]
        output_file: PathBuf,
        /// Replace the output file if it exists
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Create the initial checkpoint of a pool
    Bootstrap {
        #[arg(long, value_enum)]
        chain: Chain,
        #[arg(long, value_enum)]
        dex: Dex,
        #[arg(long, value_enum)]
        pool: LiquidityPool,
        /// Defaults to the current chain head
        #[arg(long)]
        block_number: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::from_path(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config))?;

    let db_pool = database::connect(&settings.database).await?;
    let store = Arc::new(PgStore::new(db_pool));
    let checkpoints: Arc<dyn CheckpointStore> = store.clone();
    let ledger: Arc<dyn LedgerStore> = store;

    match cli.command {
        Command::Import { chain, dex } => {
            let pools = settings.pools_for(chain, dex);
            let results = importer::import_all_pools(
                chain,
                dex,
                &pools,
                |pool| create_provider(&settings, chain, dex, pool),
                checkpoints,
                ledger,
            )
            .await;
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            info!(
                "[IMPORT-CONTINUOUS-LIQUIDITY-PROVIDER-DATA] Finished (pools={}, failed={}).",
                results.len(),
                failed
            );
        }
        Command::ImportPool { chain, dex, pool } => {
            let provider = create_provider(&settings, chain, dex, pool)?;
            let importer = LiquidityPoolImporter::new(provider, checkpoints, ledger);
            match importer.import_liquidity_provider_data().await? {
                ImportOutcome::NoCheckpoint => {
                    bail!("no block reference for {}; run `bootstrap` first", importer.checkpoint_key())
                }
                ImportOutcome::Completed(summary) => info!(
                    "Imported {} events and {} transactions over {} windows.",
                    summary.events_created, summary.transactions_created, summary.windows
                ),
            }
        }
        Command::Export { chain, dex, pool, output_file, overwrite } => {
            let provider = create_provider(&settings, chain, dex, pool)?;
            let exporter = LiquidityPoolExporter::new(provider, ledger);
            match exporter.export(&output_file, overwrite).await {
                Ok(count) => info!(
                    "Wrote {} records ({} bytes) to {}.",
                    count,
                    exporter::artifact_size(&output_file)?,
                    output_file.display()
                ),
                Err(e) => {
                    error!("Unable to export liquidity provider data. Error: {}.", e);
                    return Err(e.into());
                }
            }
        }
        Command::Bootstrap { chain, dex, pool, block_number } => {
            let provider = create_provider(&settings, chain, dex, pool)?;
            let created = importer::bootstrap_checkpoint(provider.as_ref(), checkpoints.as_ref(), block_number).await?;
            if created.is_none() {
                bail!("block reference already exists for {}/{}/{}", chain, dex, pool);
            }
        }
    }

    Ok(())
}
