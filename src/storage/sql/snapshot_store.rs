//! Unified SQL SagaSnapshotStorage implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use sea_query::{Alias, Expr, InsertStatement, Order, Query, SelectStatement};
use uuid::Uuid;

use super::SqlDatabase;
use crate::saga::SagaRegistry;
use crate::storage::schema::SagaSnapshots;
use crate::storage::{Result, SagaSnapshot, StorageError};

/// SQL-based implementation of SagaSnapshotStorage.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlSagaSnapshotStorage<DB: SqlDatabase> {
    pool: DB::Pool,
    registry: Arc<SagaRegistry>,
    table: String,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlSagaSnapshotStorage<DB> {
    /// Create a new SQL snapshot storage with the given pool.
    pub fn new(pool: DB::Pool, registry: Arc<SagaRegistry>, table: &str) -> Self {
        Self {
            pool,
            registry,
            table: table.to_string(),
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }

    fn insert_snapshot(
        &self,
        id: &str,
        revision: i32,
        payload: Vec<u8>,
        metadata: String,
    ) -> InsertStatement {
        Query::insert()
            .into_table(Alias::new(&self.table))
            .columns([
                SagaSnapshots::Id,
                SagaSnapshots::Revision,
                SagaSnapshots::Data,
                SagaSnapshots::Metadata,
                SagaSnapshots::CreatedAt,
            ])
            .values_panic([
                id.into(),
                revision.into(),
                payload.into(),
                metadata.into(),
                chrono::Utc::now().to_rfc3339().into(),
            ])
            .to_owned()
    }

    fn select_snapshots(&self, id: &str, revision: Option<i32>) -> SelectStatement {
        let mut stmt = Query::select();
        stmt.columns([SagaSnapshots::Data, SagaSnapshots::Metadata])
            .from(Alias::new(&self.table))
            .and_where(Expr::col(SagaSnapshots::Id).eq(id));
        if let Some(revision) = revision {
            stmt.and_where(Expr::col(SagaSnapshots::Revision).eq(revision));
        }
        stmt.order_by(SagaSnapshots::Revision, Order::Asc);
        stmt
    }

    fn to_snapshot(&self, id: &str, payload: &[u8], metadata: &str) -> Result<SagaSnapshot> {
        let data = self.registry.decode(id, payload)?;
        let metadata: BTreeMap<String, String> =
            serde_json::from_str(metadata).map_err(|e| StorageError::Corrupt {
                saga_id: id.to_string(),
                payload: metadata.as_bytes().to_vec(),
                reason: format!("snapshot metadata: {e}"),
            })?;
        Ok(SagaSnapshot { data, metadata })
    }
}

/// Macro to implement SagaSnapshotStorage for a specific SQL backend.
macro_rules! impl_snapshot_storage {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlSagaSnapshotStorage<$db_type> {
            async fn fetch(&self, id: Uuid, revision: Option<i32>) -> Result<Vec<SagaSnapshot>> {
                use sqlx::Row;

                let id = id.to_string();
                let sql = <$db_type>::build_select(self.select_snapshots(&id, revision));
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                rows.iter()
                    .map(|row| {
                        let payload: Vec<u8> = row.get("data");
                        let metadata: String = row.get("metadata");
                        self.to_snapshot(&id, &payload, &metadata)
                    })
                    .collect()
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::SagaSnapshotStorage for SqlSagaSnapshotStorage<$db_type> {
            async fn ensure_schema(&self) -> Result<()> {
                use crate::storage::schema::create_saga_snapshots_table;

                let sql = <$db_type>::build_table_create(create_saga_snapshots_table(&self.table));
                sqlx::query(&sql).execute(&self.pool).await?;

                tracing::debug!(table = %self.table, "Snapshot table ready");
                Ok(())
            }

            async fn save(
                &self,
                data: &dyn crate::saga::SagaData,
                metadata: &BTreeMap<String, String>,
            ) -> Result<()> {
                let saga_id = data.id();
                let revision = data.revision();
                let payload = self.registry.encode(data)?;
                let metadata = serde_json::to_string(metadata)?;

                let sql = <$db_type>::build_insert(self.insert_snapshot(
                    &saga_id.to_string(),
                    revision,
                    payload,
                    metadata,
                ));
                sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
                    super::conflict_on_unique_violation(
                        e,
                        saga_id,
                        &format!("snapshot for revision {} already saved", revision),
                    )
                })?;

                tracing::debug!(%saga_id, revision, "Saved saga snapshot");
                Ok(())
            }

            async fn load(&self, id: Uuid, revision: i32) -> Result<Option<SagaSnapshot>> {
                Ok(self.fetch(id, Some(revision)).await?.into_iter().next())
            }

            async fn list(&self, id: Uuid) -> Result<Vec<SagaSnapshot>> {
                self.fetch(id, None).await
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_snapshot_storage!(super::postgres::Postgres, "postgres");
impl_snapshot_storage!(super::sqlite::Sqlite, "sqlite");
