//! PostgreSQL-backed store tests
//!
//! Require a reachable database:
//! `DATABASE_URL=postgres://... cargo test --test test_database -- --ignored`

use lp_importer::database::{self, PgStore};
use lp_importer::enums::{Chain, Dex, LiquidityPool};
use lp_importer::messages::{Transaction, TransactionEvent};
use lp_importer::models::CheckpointKey;
use lp_importer::settings::DatabaseSettings;
use lp_importer::store::{CheckpointStore, LedgerStore, StoreError};

async fn store() -> PgStore {
    let settings = DatabaseSettings { connect_attempts: 1, ..Default::default() };
    let pool = database::connect(&settings).await.expect("Failed to connect to database");
    PgStore::new(pool)
}

fn unique_hash(tag: u64) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
    format!("0x{:032x}{:032x}", nanos, tag)
}

fn event(hash: &str, log_index: i64) -> TransactionEvent {
    TransactionEvent {
        name: "Sync".to_string(),
        contract_address: "0xE56043671df55dE5CDf8459710433C10324DE0aE".to_string(),
        topics: vec!["0x1c411e9a96e071241c2f21f7726b17ae89e3cab4c78be50e062b03a9fffbbad1".to_string()],
        data: "0x".to_string(),
        transaction_hash: hash.to_string(),
        log_index,
    }
}

fn transaction(hash: &str) -> Transaction {
    Transaction {
        transaction_hash: hash.to_string(),
        transaction_index: 3,
        block_number: 17_000_000,
        block_hash: "0xbb".to_string(),
        from_address: "0x8ba1f109551bD432803012645Ac136ddd64DBA72".to_string(),
        to_address: None,
        gas: u128::from(u64::MAX) * 4,
        gas_price: 1_000_000_000,
    }
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_record_event_dedups_in_postgres() {
    let store = store().await;
    let hash = unique_hash(1);

    let first = store.record_event(&event(&hash, 0), Some(&transaction(&hash))).await.unwrap();
    assert!(first.transaction_created && first.event_created);
    assert_eq!(first.transaction.gas, (u128::from(u64::MAX) * 4).to_string());

    let again = store.record_event(&event(&hash, 0), Some(&transaction(&hash))).await.unwrap();
    assert!(!again.transaction_created && !again.event_created);
    assert_eq!(again.event.id, first.event.id);

    let sibling = store.record_event(&event(&hash, 1), None).await.unwrap();
    assert!(sibling.event_created);
    assert_eq!(sibling.transaction.id, first.transaction.id);

    let missing = store.record_event(&event(&unique_hash(2), 0), None).await.unwrap_err();
    assert!(matches!(missing, StoreError::Integrity(_)));
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_checkpoint_roundtrip_in_postgres() {
    let store = store().await;
    let key = CheckpointKey::new(Chain::Eth, Dex::Uniswap, LiquidityPool::HexWpls);

    // Seed once; later runs reuse the existing row
    store.create_checkpoint(&key, 10, "0xseed").await.unwrap();
    assert!(store.create_checkpoint(&key, 1, "0xother").await.unwrap().is_none());

    store.set_checkpoint_block_number(&key, 42).await.unwrap();
    let record = store.get_checkpoint(&key).await.unwrap().unwrap();
    assert_eq!(record.block_number, 42);
    assert_eq!(record.key, key);

    // A stale run writing a lower height does not move the row back
    store.set_checkpoint_block_number(&key, 41).await.unwrap();
    assert_eq!(store.get_checkpoint(&key).await.unwrap().unwrap().block_number, 42);

    let err = store.set_checkpoint_block_number(&key, u64::MAX).await.unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));
}
