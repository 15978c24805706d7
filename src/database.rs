use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Connection, Executor, Pool, Postgres, Row};
use std::time::Duration;

use crate::messages::{Transaction, TransactionEvent};
use crate::models::{CheckpointKey, CheckpointRecord, ExportRecord, PersistedEvent, PersistedTransaction};
use crate::settings::DatabaseSettings;
use crate::store::{CheckpointStore, LedgerStore, RecordOutcome, StoreError};

/// PostgreSQL connection pool type alias.
pub type DbPool = Pool<Postgres>;

/// Database schema name
pub const SCHEMA: &str = "lp_importer";

const TRANSACTION_COLUMNS: &str = "id, transaction_hash, transaction_index, contract_address, block_number, \
     block_hash, from_address, to_address, gas, gas_price, created_at, updated_at";
const EVENT_COLUMNS: &str = "id, transaction_id, name, topics, data, log_index, created_at, updated_at";
const CHECKPOINT_COLUMNS: &str = "id, chain, dex, liquidity_pool, block_number, block_hash, created_at, updated_at";

pub async fn connect(settings: &DatabaseSettings) -> Result<DbPool> {
    let database_url = settings
        .resolve_url()
        .ok_or_else(|| anyhow::anyhow!("database.url or DATABASE_URL must be set"))?;

    // Retry with backoff to survive DNS/startup races when the database starts alongside us
    let mut last_err: Option<anyhow::Error> = None;
    let max_attempts = settings.connect_attempts.max(1);
    for attempt in 1..=max_attempts {
        match PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&database_url)
            .await
        {
            Ok(pool) => {
                log::info!("Connected to database (attempt {}/{}).", attempt, max_attempts);
                if let Err(e) = initialize_database(&pool).await {
                    last_err = Some(e);
                } else {
                    return Ok(pool);
                }
            }
            Err(e) => {
                last_err = Some(e.into());
            }
        }
        if attempt == max_attempts {
            break;
        }
        let delay_ms = (1u64 << attempt.min(6)) * 200; // 400ms, 800ms, ... capped at ~12.8s
        log::warn!(
            "DB connect/init attempt {}/{} failed. Retrying in {} ms...",
            attempt,
            max_attempts,
            delay_ms
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Unknown DB connection error")))
}

pub async fn initialize_database(pool: &DbPool) -> Result<()> {
    const MIGRATION_LOCK_ID: i64 = 0x4C50494D504F5254; // "LPIMPORT" in hex

    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;

    log::debug!("Acquiring database migration lock...");
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(tx.as_mut())
        .await?;

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", SCHEMA))
        .execute(tx.as_mut())
        .await?;
    create_tables(&mut tx).await?;

    tx.commit().await?;
    log::info!("Database schema `{}` is up to date.", SCHEMA);
    Ok(())
}

async fn create_tables(tx: &mut sqlx::Transaction<'_, Postgres>) -> Result<()> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {}.lp_pool_transaction (
            id BIGSERIAL PRIMARY KEY,
            transaction_hash VARCHAR(255) NOT NULL UNIQUE,
            transaction_index BIGINT NOT NULL,
            contract_address VARCHAR(255) NOT NULL,
            block_number BIGINT NOT NULL,
            block_hash VARCHAR(255) NOT NULL,
            from_address VARCHAR(255) NOT NULL,
            to_address VARCHAR(255),
            gas VARCHAR(255) NOT NULL,
            gas_price VARCHAR(255) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {}.lp_pool_transaction_event (
            id BIGSERIAL PRIMARY KEY,
            transaction_id BIGINT NOT NULL REFERENCES {}.lp_pool_transaction(id) ON DELETE CASCADE,
            name VARCHAR(255) NOT NULL,
            topics TEXT NOT NULL,
            data TEXT NOT NULL,
            log_index BIGINT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (transaction_id, log_index)
        )",
        SCHEMA, SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {}.lp_pool_block_reference (
            id BIGSERIAL PRIMARY KEY,
            chain INTEGER NOT NULL,
            chain_name VARCHAR(255) NOT NULL,
            dex INTEGER NOT NULL,
            dex_name VARCHAR(255) NOT NULL,
            liquidity_pool INTEGER NOT NULL,
            liquidity_pool_name VARCHAR(255) NOT NULL,
            block_number BIGINT NOT NULL,
            block_hash VARCHAR(255) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (chain, dex, liquidity_pool)
        )",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_lp_pool_transaction_contract ON {}.lp_pool_transaction(contract_address)",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    Ok(())
}

/// Block heights are stored as BIGINT; anything that does not fit is rejected, never wrapped.
fn height_to_db(block_number: u64) -> Result<i64, StoreError> {
    i64::try_from(block_number)
        .map_err(|_| StoreError::Integrity(format!("block number {} does not fit in BIGINT", block_number)))
}

fn height_from_db(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw).map_err(|_| StoreError::Integrity(format!("negative block number {} in database", raw)))
}

fn transaction_from_row(row: &PgRow) -> Result<PersistedTransaction, StoreError> {
    Ok(PersistedTransaction {
        id: row.try_get("id")?,
        transaction_hash: row.try_get("transaction_hash")?,
        transaction_index: row.try_get("transaction_index")?,
        contract_address: row.try_get("contract_address")?,
        block_number: height_from_db(row.try_get("block_number")?)?,
        block_hash: row.try_get("block_hash")?,
        from_address: row.try_get("from_address")?,
        to_address: row.try_get("to_address")?,
        gas: row.try_get("gas")?,
        gas_price: row.try_get("gas_price")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<PersistedEvent, StoreError> {
    let topics: String = row.try_get("topics")?;
    Ok(PersistedEvent {
        id: row.try_get("id")?,
        transaction_id: row.try_get("transaction_id")?,
        name: row.try_get("name")?,
        topics: serde_json::from_str(&topics)?,
        data: row.try_get("data")?,
        log_index: row.try_get("log_index")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn checkpoint_from_row(key: &CheckpointKey, row: &PgRow) -> Result<CheckpointRecord, StoreError> {
    Ok(CheckpointRecord {
        id: row.try_get("id")?,
        key: *key,
        block_number: height_from_db(row.try_get("block_number")?)?,
        block_hash: row.try_get("block_hash")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

pub async fn find_transaction<'e, E>(executor: E, transaction_hash: &str) -> Result<Option<PersistedTransaction>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM {}.lp_pool_transaction WHERE transaction_hash = $1",
        TRANSACTION_COLUMNS, SCHEMA
    ))
    .bind(transaction_hash)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(transaction_from_row).transpose()
}

/// Inserts a transaction row. Returns `None` if `transaction_hash` is already stored.
pub async fn create_transaction<'e, E>(
    executor: E,
    transaction: &Transaction,
    contract_address: &str,
) -> Result<Option<PersistedTransaction>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let block_number = height_to_db(transaction.block_number)?;
    let row = sqlx::query(&format!(
        "INSERT INTO {}.lp_pool_transaction
            (transaction_hash, transaction_index, contract_address, block_number, block_hash,
             from_address, to_address, gas, gas_price)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (transaction_hash) DO NOTHING
         RETURNING {}",
        SCHEMA, TRANSACTION_COLUMNS
    ))
    .bind(&transaction.transaction_hash)
    .bind(transaction.transaction_index)
    .bind(contract_address)
    .bind(block_number)
    .bind(&transaction.block_hash)
    .bind(&transaction.from_address)
    .bind(&transaction.to_address)
    .bind(transaction.gas.to_string())
    .bind(transaction.gas_price.to_string())
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(transaction_from_row).transpose()
}

pub async fn find_event<'e, E>(executor: E, transaction_id: i64, log_index: i64) -> Result<Option<PersistedEvent>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM {}.lp_pool_transaction_event WHERE transaction_id = $1 AND log_index = $2",
        EVENT_COLUMNS, SCHEMA
    ))
    .bind(transaction_id)
    .bind(log_index)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(event_from_row).transpose()
}

/// Inserts an event row. Returns `None` if `(transaction_id, log_index)` is already stored.
pub async fn create_event<'e, E>(
    executor: E,
    transaction_id: i64,
    event: &TransactionEvent,
) -> Result<Option<PersistedEvent>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let topics = serde_json::to_string(&event.topics)?;
    let row = sqlx::query(&format!(
        "INSERT INTO {}.lp_pool_transaction_event (transaction_id, name, topics, data, log_index)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (transaction_id, log_index) DO NOTHING
         RETURNING {}",
        SCHEMA, EVENT_COLUMNS
    ))
    .bind(transaction_id)
    .bind(&event.name)
    .bind(topics)
    .bind(&event.data)
    .bind(event.log_index)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(event_from_row).transpose()
}

/// Both storage contracts backed by one PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl CheckpointStore for PgStore {
    async fn get_checkpoint(&self, key: &CheckpointKey) -> Result<Option<CheckpointRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {}.lp_pool_block_reference
             WHERE chain = $1 AND dex = $2 AND liquidity_pool = $3",
            CHECKPOINT_COLUMNS, SCHEMA
        ))
        .bind(key.chain.id())
        .bind(key.dex.id())
        .bind(key.liquidity_pool.id())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(|r| checkpoint_from_row(key, r)).transpose()
    }

    async fn set_checkpoint_block_number(&self, key: &CheckpointKey, block_number: u64) -> Result<(), StoreError> {
        let result = sqlx::query(&format!(
            "UPDATE {}.lp_pool_block_reference
             SET block_number = GREATEST(block_number, $4), updated_at = NOW()
             WHERE chain = $1 AND dex = $2 AND liquidity_pool = $3",
            SCHEMA
        ))
        .bind(key.chain.id())
        .bind(key.dex.id())
        .bind(key.liquidity_pool.id())
        .bind(height_to_db(block_number)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Integrity(format!("no checkpoint exists for {}", key)));
        }
        Ok(())
    }

    async fn create_checkpoint(
        &self,
        key: &CheckpointKey,
        block_number: u64,
        block_hash: &str,
    ) -> Result<Option<CheckpointRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO {}.lp_pool_block_reference
                (chain, chain_name, dex, dex_name, liquidity_pool, liquidity_pool_name, block_number, block_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (chain, dex, liquidity_pool) DO NOTHING
             RETURNING {}",
            SCHEMA, CHECKPOINT_COLUMNS
        ))
        .bind(key.chain.id())
        .bind(key.chain.label())
        .bind(key.dex.id())
        .bind(key.dex.label())
        .bind(key.liquidity_pool.id())
        .bind(key.liquidity_pool.label())
        .bind(height_to_db(block_number)?)
        .bind(block_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(|r| checkpoint_from_row(key, r)).transpose()
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn find_transaction(&self, transaction_hash: &str) -> Result<Option<PersistedTransaction>, StoreError> {
        find_transaction(&self.pool, transaction_hash).await
    }

    async fn find_event(&self, transaction_id: i64, log_index: i64) -> Result<Option<PersistedEvent>, StoreError> {
        find_event(&self.pool, transaction_id, log_index).await
    }

    async fn record_event(
        &self,
        event: &TransactionEvent,
        transaction: Option<&Transaction>,
    ) -> Result<RecordOutcome, StoreError> {
        // Dropping `tx` on any early return rolls it back.
        let mut tx = self.pool.begin().await?;

        let (transaction_row, transaction_created) = match find_transaction(&mut *tx, &event.transaction_hash).await? {
            Some(row) => (row, false),
            None => {
                let detail = transaction.ok_or_else(|| {
                    StoreError::Integrity(format!(
                        "transaction {} is not stored and no detail was supplied",
                        event.transaction_hash
                    ))
                })?;
                if detail.transaction_hash != event.transaction_hash {
                    return Err(StoreError::Integrity(format!(
                        "transaction detail {} does not match event transaction {}",
                        detail.transaction_hash, event.transaction_hash
                    )));
                }
                match create_transaction(&mut *tx, detail, &event.contract_address).await? {
                    Some(row) => (row, true),
                    // lost the insert race to a concurrent run
                    None => (
                        find_transaction(&mut *tx, &event.transaction_hash).await?.ok_or_else(|| {
                            StoreError::Integrity(format!("transaction {} vanished after conflict", event.transaction_hash))
                        })?,
                        false,
                    ),
                }
            }
        };

        let (event_row, event_created) = match find_event(&mut *tx, transaction_row.id, event.log_index).await? {
            Some(row) => (row, false),
            None => match create_event(&mut *tx, transaction_row.id, event).await? {
                Some(row) => (row, true),
                None => (
                    find_event(&mut *tx, transaction_row.id, event.log_index).await?.ok_or_else(|| {
                        StoreError::Integrity(format!(
                            "event ({}, {}) vanished after conflict",
                            event.transaction_hash, event.log_index
                        ))
                    })?,
                    false,
                ),
            },
        };

        tx.commit().await?;

        Ok(RecordOutcome {
            transaction: transaction_row,
            event: event_row,
            transaction_created,
            event_created,
        })
    }

    async fn events_for_contract(&self, contract_address: &str) -> Result<Vec<ExportRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT t.transaction_hash, t.transaction_index, t.contract_address, t.block_number,
                    t.block_hash, t.from_address, t.to_address, t.gas, t.gas_price,
                    e.name, e.topics, e.data, e.log_index
             FROM {}.lp_pool_transaction_event e
             JOIN {}.lp_pool_transaction t ON t.id = e.transaction_id
             WHERE t.contract_address = $1
             ORDER BY t.block_number, t.transaction_index, e.log_index",
            SCHEMA, SCHEMA
        ))
        .bind(contract_address)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ExportRecord, StoreError> {
                let topics: String = row.try_get("topics")?;
                Ok(ExportRecord {
                    contract_address: row.try_get("contract_address")?,
                    event_name: row.try_get("name")?,
                    topics: serde_json::from_str(&topics)?,
                    data: row.try_get("data")?,
                    block_number: height_from_db(row.try_get("block_number")?)?,
                    transaction_hash: row.try_get("transaction_hash")?,
                    transaction_index: row.try_get("transaction_index")?,
                    block_hash: row.try_get("block_hash")?,
                    log_index: row.try_get("log_index")?,
                    transaction_from_address: row.try_get("from_address")?,
                    transaction_to_address: row.try_get("to_address")?,
                    transaction_gas: row.try_get("gas")?,
                    transaction_gas_price: row.try_get("gas_price")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_conversion_rejects_overflow() {
        assert_eq!(height_to_db(17_000_000).unwrap(), 17_000_000);
        assert_eq!(height_to_db(i64::MAX as u64).unwrap(), i64::MAX);
        assert!(matches!(height_to_db(u64::MAX), Err(StoreError::Integrity(_))));
        assert!(matches!(height_to_db(i64::MAX as u64 + 1), Err(StoreError::Integrity(_))));

        assert_eq!(height_from_db(42).unwrap(), 42);
        assert!(matches!(height_from_db(-1), Err(StoreError::Integrity(_))));
    }
}
