//! # LP Importer
//!
//! Incremental, checkpoint-driven import of liquidity-pool events and their transactions from
//! an EVM node into PostgreSQL, plus export of the imported history to a binary artifact.
//!
//! ## Overview
//!
//! - **Providers**: one [`DexProvider`] per (chain, DEX, pool) reads logs, transactions and
//!   chain head from the node and normalizes them through the validator.
//! - **Import**: [`LiquidityPoolImporter`] walks block windows from the stored checkpoint to
//!   the chain head, persisting each event and its transaction exactly once, and advances the
//!   checkpoint only after the whole range succeeded.
//! - **Export**: [`LiquidityPoolExporter`] flattens a pool's stored events into
//!   [`ExportRecord`](models::ExportRecord)s and writes them to a file.
//!
//! ## Architecture
//!
//! ### Domain Layer
//! Chain, DEX and pool enums, normalized messages and the raw-payload validator.
//!
//! ### Provider Layer
//! The [`DexProvider`] capability and its per-DEX implementations.
//!
//! ### Storage Layer
//! [`CheckpointStore`](store::CheckpointStore) and [`LedgerStore`](store::LedgerStore), backed by
//! PostgreSQL in production and by in-memory stores in tests.

// Domain
/// Chains, DEXes and liquidity pools
pub mod enums;
/// Normalized transaction and event messages
pub mod messages;
/// Raw node payload validation
pub mod validator;
/// Persisted rows and export records
pub mod models;

// Providers
/// DEX provider capability
pub mod dex_provider;
/// Per-DEX provider implementations and factory
pub mod adapters;

// Storage
/// Checkpoint and ledger storage contracts
pub mod store;
/// PostgreSQL database integration
pub mod database;
/// In-memory stores
pub mod memory_store;

// Engines
/// Incremental import engine
pub mod importer;
/// Artifact export
pub mod exporter;

// Utilities
/// Block-window pagination
pub mod utils;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use dex_provider::DexProvider;
pub use exporter::LiquidityPoolExporter;
pub use importer::LiquidityPoolImporter;
pub use settings::Settings;
