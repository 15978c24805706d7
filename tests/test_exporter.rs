//! Integration tests for exporting imported pool data

mod common;

use std::sync::Arc;
use tempfile::tempdir;

use common::{checksummed, tx_hash, ScriptedProvider, POOL_ADDRESS};
use lp_importer::enums::{Chain, Dex, LiquidityPool};
use lp_importer::exporter::{read_artifact, ExportError, LiquidityPoolExporter};
use lp_importer::importer::LiquidityPoolImporter;
use lp_importer::memory_store::{MemoryCheckpointStore, MemoryLedgerStore};
use lp_importer::models::CheckpointKey;
use lp_importer::store::CheckpointStore;

async fn imported() -> (Arc<ScriptedProvider>, Arc<MemoryLedgerStore>) {
    let provider = Arc::new(ScriptedProvider::new(400, 100));
    provider.add_swap(350, 2, 4);
    provider.add_swap(120, 1, 1);
    provider.add_swap(120, 1, 0);

    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let key = CheckpointKey::new(Chain::Pulse, Dex::PulseX, LiquidityPool::WplsDai);
    checkpoints.create_checkpoint(&key, 100, "0xseed").await.unwrap();
    let ledger = Arc::new(MemoryLedgerStore::new());

    LiquidityPoolImporter::new(provider.clone(), checkpoints, ledger.clone())
        .import_liquidity_provider_data()
        .await
        .expect("import should succeed");
    (provider, ledger)
}

#[tokio::test]
async fn test_export_flattens_events_with_transactions() {
    let (provider, ledger) = imported().await;
    let exporter = LiquidityPoolExporter::new(provider, ledger);

    let records = exporter.get_liquidity_provider_data().await.unwrap();
    let keys: Vec<(u64, i64)> = records.iter().map(|r| (r.block_number, r.log_index)).collect();
    assert_eq!(keys, vec![(120, 0), (120, 1), (350, 4)]);

    let first = &records[0];
    assert_eq!(first.contract_address, checksummed(POOL_ADDRESS));
    assert_eq!(first.event_name, "Swap");
    assert_eq!(first.transaction_hash, tx_hash(1));
    assert_eq!(first.block_hash, common::block_hash(120));
    assert_eq!(
        first.transaction_to_address,
        Some(checksummed("0x165c3410fc91ef562c50559f7d2289febed552d9"))
    );
    assert_eq!(first.transaction_gas, "200000");
    assert_eq!(first.transaction_gas_price, "10000000000");
}

#[tokio::test]
async fn test_export_writes_artifact() {
    let (provider, ledger) = imported().await;
    let exporter = LiquidityPoolExporter::new(provider, ledger);
    let dir = tempdir().unwrap();
    let path = dir.path().join("wpls_dai.bin");

    assert_eq!(exporter.export(&path, false).await.unwrap(), 3);
    let decoded = read_artifact(&path).unwrap();
    assert_eq!(decoded, exporter.get_liquidity_provider_data().await.unwrap());

    let err = exporter.export(&path, false).await.unwrap_err();
    assert!(matches!(err, ExportError::ArtifactExists(_)));
    assert_eq!(exporter.export(&path, true).await.unwrap(), 3);
}

#[tokio::test]
async fn test_export_rejects_missing_directory() {
    let (provider, ledger) = imported().await;
    let exporter = LiquidityPoolExporter::new(provider, ledger);
    let dir = tempdir().unwrap();

    let err = exporter.export(&dir.path().join("nope").join("out.bin"), true).await.unwrap_err();
    assert!(matches!(err, ExportError::DirectoryMissing(_)));
}

#[tokio::test]
async fn test_export_of_empty_pool() {
    let provider = Arc::new(ScriptedProvider::new(10, 10));
    let exporter = LiquidityPoolExporter::new(provider, Arc::new(MemoryLedgerStore::new()));
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.bin");

    assert_eq!(exporter.export(&path, false).await.unwrap(), 0);
    assert!(read_artifact(&path).unwrap().is_empty());
}
