//! Storage configuration types.

use serde::Deserialize;

/// Storage type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Sqlite,
    Postgres,
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Sqlite => write!(f, "sqlite"),
            StorageType::Postgres => write!(f, "postgres"),
        }
    }
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// SQLite-specific configuration.
    pub sqlite: SqliteConfig,
    /// PostgreSQL-specific configuration.
    pub postgres: PostgresConfig,
    /// Table names.
    pub tables: TableNames,
    /// Create missing tables when storage is initialized.
    pub auto_create_tables: bool,
    /// Whether the subscription table is shared by every endpoint.
    pub subscriptions_centralized: bool,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            sqlite: SqliteConfig::default(),
            postgres: PostgresConfig::default(),
            tables: TableNames::default(),
            auto_create_tables: true,
            subscriptions_centralized: false,
            max_connections: 5,
        }
    }
}

/// SQLite-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Path to database file.
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "./data/sagas.db".to_string(),
        }
    }
}

/// PostgreSQL-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// PostgreSQL connection URI.
    pub uri: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            uri: "postgres://localhost:5432/sagas".to_string(),
        }
    }
}

/// Names of the tables owned by the storage providers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableNames {
    /// Saga data table (id, revision, data).
    pub sagas: String,
    /// Saga correlation index table.
    pub saga_index: String,
    /// Topic subscriptions table.
    pub subscriptions: String,
    /// Saga snapshot (audit) table.
    pub snapshots: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            sagas: "sagas".to_string(),
            saga_index: "saga_index".to_string(),
            subscriptions: "subscriptions".to_string(),
            snapshots: "saga_snapshots".to_string(),
        }
    }
}
