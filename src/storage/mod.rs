//! Storage implementations.
//!
//! This module contains:
//! - `SagaStorage` trait: optimistic-concurrency saga persistence with a
//!   correlation index
//! - `SubscriptionStorage` trait: topic → subscriber address lists
//! - `SagaSnapshotStorage` trait: append-only saga audit snapshots
//! - Implementations: SQL (SQLite, PostgreSQL), Mock (in-memory)

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::config::{StorageConfig, StorageType};
use crate::saga::SagaRegistry;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod saga_store;
pub mod schema;
pub mod snapshot_store;
pub mod sql;
pub mod subscription_store;

pub use saga_store::{SagaStorage, SagaStorageExt};
pub use snapshot_store::{SagaSnapshot, SagaSnapshotStorage};
pub use subscription_store::SubscriptionStorage;

#[cfg(feature = "postgres")]
pub use sql::postgres::{
    PostgresSagaSnapshotStorage, PostgresSagaStorage, PostgresSubscriptionStorage,
};
#[cfg(feature = "sqlite")]
pub use sql::sqlite::{SqliteSagaSnapshotStorage, SqliteSagaStorage, SqliteSubscriptionStorage};

// ============================================================================
// Errors
// ============================================================================

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The caller broke an operation precondition. Never retried.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Stale revision or key collision. The caller may reload and retry.
    #[error("Concurrency conflict on saga {saga_id}: {reason}")]
    ConcurrencyConflict { saga_id: Uuid, reason: String },

    #[error("Invalid saga id: {value:?}")]
    InvalidId { value: String },

    /// A stored row could not be turned back into saga data.
    #[error("Corrupt saga data: saga_id={saga_id}, {} bytes: {reason}", .payload.len())]
    Corrupt {
        saga_id: String,
        payload: Vec<u8>,
        reason: String,
    },

    #[error("Unknown saga type: {0}")]
    UnknownSagaType(String),

    /// Exactly one of a pair of tables exists.
    #[error("Schema inconsistency: table '{present}' exists but '{missing}' does not")]
    SchemaInconsistency { present: String, missing: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage backend '{0}' is not enabled in this build")]
    BackendUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn conflict(saga_id: Uuid, reason: impl Into<String>) -> Self {
        StorageError::ConcurrencyConflict {
            saga_id,
            reason: reason.into(),
        }
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, StorageError::ConcurrencyConflict { .. })
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// The storage providers built from one configuration.
#[derive(Clone)]
pub struct StorageProviders {
    pub sagas: Arc<dyn SagaStorage>,
    pub subscriptions: Arc<dyn SubscriptionStorage>,
    pub snapshots: Arc<dyn SagaSnapshotStorage>,
}

impl StorageProviders {
    /// Create every table the providers own.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.sagas.ensure_schema().await?;
        self.subscriptions.ensure_schema().await?;
        self.snapshots.ensure_schema().await?;
        Ok(())
    }
}

/// Initialize storage based on configuration.
///
/// All providers share one connection pool. Tables are created when
/// `auto_create_tables` is set.
pub async fn init_storage(
    config: &StorageConfig,
    registry: SagaRegistry,
) -> Result<StorageProviders> {
    let registry = Arc::new(registry);

    let providers = match config.storage_type {
        StorageType::Sqlite => init_sqlite(config, registry).await?,
        StorageType::Postgres => init_postgres(config, registry).await?,
    };

    if config.auto_create_tables {
        providers.ensure_schema().await?;
    }

    Ok(providers)
}

#[cfg(feature = "sqlite")]
async fn init_sqlite(config: &StorageConfig, registry: Arc<SagaRegistry>) -> Result<StorageProviders> {
    use sqlx::sqlite::SqlitePoolOptions;

    info!(path = %config.sqlite.path, "Storage: sqlite");

    if let Some(parent) = std::path::Path::new(&config.sqlite.path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&format!("sqlite:{}?mode=rwc", config.sqlite.path))
        .await?;

    let tables = &config.tables;
    Ok(StorageProviders {
        sagas: Arc::new(SqliteSagaStorage::new(
            pool.clone(),
            registry.clone(),
            &tables.sagas,
            &tables.saga_index,
        )),
        subscriptions: Arc::new(SqliteSubscriptionStorage::new(
            pool.clone(),
            &tables.subscriptions,
            config.subscriptions_centralized,
        )),
        snapshots: Arc::new(SqliteSagaSnapshotStorage::new(
            pool,
            registry,
            &tables.snapshots,
        )),
    })
}

#[cfg(not(feature = "sqlite"))]
async fn init_sqlite(_config: &StorageConfig, _registry: Arc<SagaRegistry>) -> Result<StorageProviders> {
    tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
    Err(StorageError::BackendUnavailable(StorageType::Sqlite.to_string()))
}

#[cfg(feature = "postgres")]
async fn init_postgres(
    config: &StorageConfig,
    registry: Arc<SagaRegistry>,
) -> Result<StorageProviders> {
    use sqlx::postgres::PgPoolOptions;

    info!("Storage: postgres");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.postgres.uri)
        .await?;

    let tables = &config.tables;
    Ok(StorageProviders {
        sagas: Arc::new(PostgresSagaStorage::new(
            pool.clone(),
            registry.clone(),
            &tables.sagas,
            &tables.saga_index,
        )),
        subscriptions: Arc::new(PostgresSubscriptionStorage::new(
            pool.clone(),
            &tables.subscriptions,
            config.subscriptions_centralized,
        )),
        snapshots: Arc::new(PostgresSagaSnapshotStorage::new(
            pool,
            registry,
            &tables.snapshots,
        )),
    })
}

#[cfg(not(feature = "postgres"))]
async fn init_postgres(
    _config: &StorageConfig,
    _registry: Arc<SagaRegistry>,
) -> Result<StorageProviders> {
    tracing::error!("PostgreSQL storage requested but 'postgres' feature is not enabled");
    Err(StorageError::BackendUnavailable(StorageType::Postgres.to_string()))
}
