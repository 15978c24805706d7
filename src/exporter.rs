//! Dumps everything imported for one pool into a single binary artifact.
//!
//! The artifact is a bincode-encoded `Vec<ExportRecord>`, one record per stored event joined
//! with its transaction, ordered by block, transaction index and log index.

use log::{error, info};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dex_provider::DexProvider;
use crate::enums::log_prefix;
use crate::models::ExportRecord;
use crate::store::{LedgerStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("output directory does not exist: {0}")]
    DirectoryMissing(PathBuf),
    #[error("output file already exists: {0}")]
    ArtifactExists(PathBuf),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),
}

pub struct LiquidityPoolExporter {
    provider: Arc<dyn DexProvider>,
    ledger: Arc<dyn LedgerStore>,
    log_prefix: String,
}

impl LiquidityPoolExporter {
    pub fn new(provider: Arc<dyn DexProvider>, ledger: Arc<dyn LedgerStore>) -> Self {
        let log_prefix = log_prefix(
            provider.chain(),
            provider.dex(),
            provider.liquidity_pool(),
            "LIQUIDITY-POOL-EXPORTER",
        );
        Self { provider, ledger, log_prefix }
    }

    /// Every stored event of this pool's contract, flattened with its transaction.
    pub async fn get_liquidity_provider_data(&self) -> Result<Vec<ExportRecord>, ExportError> {
        let contract_address = self.provider.contract_address();
        let records = self.ledger.events_for_contract(contract_address).await.map_err(|e| {
            error!("{} Unable to load liquidity provider data. Error: {}.", self.log_prefix, e);
            ExportError::from(e)
        })?;
        info!(
            "{} Loaded {} liquidity provider events (contract_address={}).",
            self.log_prefix,
            records.len(),
            contract_address
        );
        Ok(records)
    }

    /// Loads the pool's data and writes it to `output_file`.
    pub async fn export(&self, output_file: &Path, overwrite: bool) -> Result<usize, ExportError> {
        check_destination(output_file, overwrite)?;
        let records = self.get_liquidity_provider_data().await?;
        persist_artifact(&records, output_file, overwrite)?;
        info!(
            "{} Exported {} liquidity provider events to {}.",
            self.log_prefix,
            records.len(),
            output_file.display()
        );
        Ok(records.len())
    }
}

fn check_directory(output_file: &Path) -> Result<(), ExportError> {
    let parent = match output_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(ExportError::DirectoryMissing(parent.to_path_buf()));
    }
    Ok(())
}

fn check_destination(output_file: &Path, overwrite: bool) -> Result<(), ExportError> {
    check_directory(output_file)?;
    if output_file.exists() && !overwrite {
        return Err(ExportError::ArtifactExists(output_file.to_path_buf()));
    }
    Ok(())
}

fn open_artifact(output_file: &Path, overwrite: bool) -> Result<File, ExportError> {
    if overwrite {
        return Ok(File::create(output_file)?);
    }
    // create_new makes the existence check and the create one step
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output_file)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ExportError::ArtifactExists(output_file.to_path_buf()),
            _ => ExportError::Io(e),
        })
}

/// Writes `records` to exactly `output_file`.
///
/// Fails without touching the filesystem when the parent directory is missing, or when the
/// file exists and `overwrite` is false.
pub fn persist_artifact(records: &[ExportRecord], output_file: &Path, overwrite: bool) -> Result<(), ExportError> {
    check_directory(output_file)?;
    let mut writer = BufWriter::new(open_artifact(output_file, overwrite)?);
    bincode::serialize_into(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

pub fn read_artifact(path: &Path) -> Result<Vec<ExportRecord>, ExportError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}

/// Size of an artifact on disk, for logging.
pub fn artifact_size(path: &Path) -> Result<u64, ExportError> {
    Ok(fs::metadata(path)?.len())
}
