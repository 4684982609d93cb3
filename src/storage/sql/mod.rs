//! Unified SQL storage implementations.
//!
//! This module provides shared implementations for SQL-based storage backends
//! (PostgreSQL, SQLite). The implementations are parameterized by database type
//! using the `SqlDatabase` trait.
//!
//! Each public operation runs inside one `sqlx::Transaction`. Dropping a
//! transaction without committing rolls it back, so an early `?` return
//! leaves no partial writes behind.

use std::collections::HashSet;

use tracing::warn;
use uuid::Uuid;

use super::StorageError;

mod query;
mod saga_store;
mod snapshot_store;
mod subscription_store;

pub use query::SqlDatabase;
pub use saga_store::SqlSagaStorage;
pub use snapshot_store::SqlSagaSnapshotStorage;
pub use subscription_store::SqlSubscriptionStorage;

/// Whether the database rejected a write for violating a unique or primary
/// key constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

/// Translate a unique violation into a concurrency conflict; pass every other
/// error through unchanged.
pub(crate) fn conflict_on_unique_violation(
    err: sqlx::Error,
    saga_id: Uuid,
    reason: &str,
) -> StorageError {
    if is_unique_violation(&err) {
        warn!(%saga_id, reason, "Concurrency conflict");
        StorageError::conflict(saga_id, reason)
    } else {
        StorageError::Database(err)
    }
}

/// Table names compare case-insensitively across backends.
pub(crate) fn normalize_table_names(names: impl IntoIterator<Item = String>) -> HashSet<String> {
    names.into_iter().map(|n| n.to_lowercase()).collect()
}

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    use sea_query::PostgresQueryBuilder;
    use sqlx::PgPool;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = PgPool;

        const LIST_TABLES: &'static str = "SELECT CAST(table_name AS TEXT) AS table_name \
             FROM information_schema.tables WHERE table_schema = current_schema()";

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_update(stmt: sea_query::UpdateStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_delete(stmt: sea_query::DeleteStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_table_create(stmt: sea_query::TableCreateStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_index_create(stmt: sea_query::IndexCreateStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }
    }

    /// PostgreSQL saga storage.
    pub type PostgresSagaStorage = super::SqlSagaStorage<Postgres>;

    /// PostgreSQL subscription storage.
    pub type PostgresSubscriptionStorage = super::SqlSubscriptionStorage<Postgres>;

    /// PostgreSQL saga snapshot storage.
    pub type PostgresSagaSnapshotStorage = super::SqlSagaSnapshotStorage<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    use sea_query::SqliteQueryBuilder;
    use sqlx::SqlitePool;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = SqlitePool;

        const LIST_TABLES: &'static str =
            "SELECT name AS table_name FROM sqlite_master WHERE type = 'table'";

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_update(stmt: sea_query::UpdateStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_delete(stmt: sea_query::DeleteStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_table_create(stmt: sea_query::TableCreateStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_index_create(stmt: sea_query::IndexCreateStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }
    }

    /// SQLite saga storage.
    pub type SqliteSagaStorage = super::SqlSagaStorage<Sqlite>;

    /// SQLite subscription storage.
    pub type SqliteSubscriptionStorage = super::SqlSubscriptionStorage<Sqlite>;

    /// SQLite saga snapshot storage.
    pub type SqliteSagaSnapshotStorage = super::SqlSagaSnapshotStorage<Sqlite>;
}
