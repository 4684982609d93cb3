//! Unified SQL SagaStorage implementation.
//!
//! Statements are built once, generically, with sea-query; a macro then
//! generates the `SagaStorage` implementation for each SQL backend so that
//! execution runs against the concrete sqlx connection type.
//!
//! Statement order inside a transaction matters:
//! - insert: data row, then index entries
//! - update: delete index entries, revision-checked data update, insert index entries
//! - delete: revision-checked data delete, then index entries

use std::marker::PhantomData;
use std::sync::Arc;

use sea_query::{
    Alias, DeleteStatement, Expr, InsertStatement, Query, SelectStatement, UpdateStatement,
};
use tracing::error;

use super::SqlDatabase;
use crate::saga::{IndexEntry, SagaRegistry};
use crate::storage::schema::{SagaIndex, Sagas};
use crate::storage::StorageError;

/// SQL-based implementation of SagaStorage.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlSagaStorage<DB: SqlDatabase> {
    pool: DB::Pool,
    registry: Arc<SagaRegistry>,
    data_table: String,
    index_table: String,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlSagaStorage<DB> {
    /// Create a new SQL saga storage over `data_table` and `index_table`.
    pub fn new(
        pool: DB::Pool,
        registry: Arc<SagaRegistry>,
        data_table: &str,
        index_table: &str,
    ) -> Self {
        Self {
            pool,
            registry,
            data_table: data_table.to_string(),
            index_table: index_table.to_string(),
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }

    pub fn data_table(&self) -> &str {
        &self.data_table
    }

    pub fn index_table(&self) -> &str {
        &self.index_table
    }

    fn inconsistent(&self, present: &str, missing: &str) -> StorageError {
        error!(
            present,
            missing, "Saga tables are inconsistent; refusing to create the missing one"
        );
        StorageError::SchemaInconsistency {
            present: present.to_string(),
            missing: missing.to_string(),
        }
    }

    fn select_by_id(&self, id: &str) -> SelectStatement {
        Query::select()
            .column(Sagas::Id)
            .column(Sagas::Data)
            .from(Alias::new(&self.data_table))
            .and_where(Expr::col(Sagas::Id).eq(id))
            .to_owned()
    }

    fn select_by_correlation(&self, saga_type: &str, key: &str, value: &str) -> SelectStatement {
        let data = Alias::new(&self.data_table);
        let index = Alias::new(&self.index_table);

        Query::select()
            .column((data.clone(), Sagas::Id))
            .column((data.clone(), Sagas::Data))
            .from(data.clone())
            .inner_join(
                index.clone(),
                Expr::col((index.clone(), SagaIndex::SagaId)).equals((data, Sagas::Id)),
            )
            .and_where(Expr::col((index.clone(), SagaIndex::SagaType)).eq(saga_type))
            .and_where(Expr::col((index.clone(), SagaIndex::Key)).eq(key))
            .and_where(Expr::col((index, SagaIndex::Value)).eq(value))
            .to_owned()
    }

    fn insert_data(&self, id: &str, revision: i32, payload: Vec<u8>) -> InsertStatement {
        Query::insert()
            .into_table(Alias::new(&self.data_table))
            .columns([Sagas::Id, Sagas::Revision, Sagas::Data])
            .values_panic([id.into(), revision.into(), payload.into()])
            .to_owned()
    }

    fn update_data(
        &self,
        id: &str,
        expected_revision: i32,
        next_revision: i32,
        payload: Vec<u8>,
    ) -> UpdateStatement {
        Query::update()
            .table(Alias::new(&self.data_table))
            .values([
                (Sagas::Revision, next_revision.into()),
                (Sagas::Data, payload.into()),
            ])
            .and_where(Expr::col(Sagas::Id).eq(id))
            .and_where(Expr::col(Sagas::Revision).eq(expected_revision))
            .to_owned()
    }

    fn delete_data(&self, id: &str, expected_revision: i32) -> DeleteStatement {
        Query::delete()
            .from_table(Alias::new(&self.data_table))
            .and_where(Expr::col(Sagas::Id).eq(id))
            .and_where(Expr::col(Sagas::Revision).eq(expected_revision))
            .to_owned()
    }

    /// `None` when there is nothing to index.
    fn insert_index(&self, entries: &[IndexEntry]) -> Option<InsertStatement> {
        if entries.is_empty() {
            return None;
        }

        let mut stmt = Query::insert();
        stmt.into_table(Alias::new(&self.index_table)).columns([
            SagaIndex::SagaType,
            SagaIndex::Key,
            SagaIndex::Value,
            SagaIndex::SagaId,
        ]);
        for entry in entries {
            stmt.values_panic([
                entry.saga_type.as_str().into(),
                entry.key.as_str().into(),
                entry.value.as_str().into(),
                entry.saga_id.to_string().into(),
            ]);
        }
        Some(stmt)
    }

    fn delete_index(&self, id: &str) -> DeleteStatement {
        Query::delete()
            .from_table(Alias::new(&self.index_table))
            .and_where(Expr::col(SagaIndex::SagaId).eq(id))
            .to_owned()
    }
}

/// Macro to implement SagaStorage for a specific SQL backend.
///
/// `$conn` is the backend's connection type; transactions deref to it.
macro_rules! impl_saga_storage {
    ($db_type:ty, $conn:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlSagaStorage<$db_type> {
            async fn table_names(
                &self,
            ) -> crate::storage::Result<std::collections::HashSet<String>> {
                use sqlx::Row;

                let rows = sqlx::query(<$db_type as SqlDatabase>::LIST_TABLES)
                    .fetch_all(&self.pool)
                    .await?;

                Ok(super::normalize_table_names(
                    rows.iter().map(|row| row.get::<String, _>("table_name")),
                ))
            }

            async fn insert_index_entries(
                &self,
                conn: &mut $conn,
                saga_id: uuid::Uuid,
                entries: &[IndexEntry],
            ) -> crate::storage::Result<()> {
                // Render before awaiting; sea-query statements are not Send.
                let sql = self.insert_index(entries).map(<$db_type>::build_insert);
                if let Some(sql) = sql {
                    sqlx::query(&sql)
                        .execute(&mut *conn)
                        .await
                        .map_err(|e| {
                            super::conflict_on_unique_violation(
                                e,
                                saga_id,
                                "correlation value already owned by another saga",
                            )
                        })?;
                }
                Ok(())
            }

            /// Runs with `data` already carrying the next revision.
            async fn try_update(
                &self,
                data: &dyn crate::saga::SagaData,
                expected_revision: i32,
                correlation: &[crate::saga::CorrelationProperty],
            ) -> crate::storage::Result<()> {
                let saga_id = data.id();
                let id = saga_id.to_string();
                let payload = self.registry.encode(data)?;
                let entries = crate::saga::index_entries(data, correlation);

                let mut tx = self.pool.begin().await?;

                let sql = <$db_type>::build_delete(self.delete_index(&id));
                sqlx::query(&sql).execute(&mut *tx).await?;

                let sql = <$db_type>::build_update(self.update_data(
                    &id,
                    expected_revision,
                    data.revision(),
                    payload,
                ));
                let result = sqlx::query(&sql).execute(&mut *tx).await?;
                if result.rows_affected() == 0 {
                    tracing::warn!(%saga_id, expected_revision, "Saga update lost the race");
                    return Err(StorageError::conflict(
                        saga_id,
                        format!(
                            "revision {} is stale or the saga was deleted",
                            expected_revision
                        ),
                    ));
                }

                self.insert_index_entries(&mut tx, saga_id, &entries).await?;

                tx.commit().await?;
                Ok(())
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::SagaStorage for SqlSagaStorage<$db_type> {
            async fn ensure_schema(&self) -> crate::storage::Result<()> {
                use crate::storage::schema::{
                    create_saga_index_id_index, create_saga_index_table, create_sagas_table,
                };

                let tables = self.table_names().await?;
                let has_data = tables.contains(&self.data_table.to_lowercase());
                let has_index = tables.contains(&self.index_table.to_lowercase());

                match (has_data, has_index) {
                    (true, true) => {
                        tracing::debug!(
                            data_table = %self.data_table,
                            index_table = %self.index_table,
                            "Saga tables already exist"
                        );
                        Ok(())
                    }
                    (false, false) => {
                        let statements = [
                            <$db_type>::build_table_create(create_sagas_table(&self.data_table)),
                            <$db_type>::build_table_create(create_saga_index_table(
                                &self.index_table,
                            )),
                            <$db_type>::build_index_create(create_saga_index_id_index(
                                &self.index_table,
                            )),
                        ];

                        let mut tx = self.pool.begin().await?;
                        for sql in &statements {
                            sqlx::query(sql).execute(&mut *tx).await?;
                        }
                        tx.commit().await?;

                        tracing::info!(
                            data_table = %self.data_table,
                            index_table = %self.index_table,
                            "Created saga tables"
                        );
                        Ok(())
                    }
                    (true, false) => Err(self.inconsistent(&self.data_table, &self.index_table)),
                    (false, true) => Err(self.inconsistent(&self.index_table, &self.data_table)),
                }
            }

            async fn find(
                &self,
                saga_type: &str,
                property: &str,
                value: Option<&str>,
            ) -> crate::storage::Result<Option<Box<dyn crate::saga::SagaData>>> {
                use sqlx::Row;

                let value = value.unwrap_or_default();

                let stmt = if property == crate::saga::ID_PROPERTY {
                    let id = uuid::Uuid::parse_str(value).map_err(|_| StorageError::InvalidId {
                        value: value.to_string(),
                    })?;
                    self.select_by_id(&id.to_string())
                } else {
                    self.select_by_correlation(saga_type, property, value)
                };

                let sql = <$db_type>::build_select(stmt);
                let mut tx = self.pool.begin().await?;
                let row = sqlx::query(&sql).fetch_optional(&mut *tx).await?;
                tx.commit().await?;

                match row {
                    Some(row) => {
                        let saga_id: String = row.get("id");
                        let payload: Vec<u8> = row.get("data");
                        self.registry.decode_as_type(saga_type, &saga_id, &payload)
                    }
                    None => {
                        tracing::debug!(saga_type, property, value, "Saga not found");
                        Ok(None)
                    }
                }
            }

            async fn insert(
                &self,
                data: &dyn crate::saga::SagaData,
                correlation: &[crate::saga::CorrelationProperty],
            ) -> crate::storage::Result<()> {
                crate::storage::saga_store::validate_insert(data)?;

                let saga_id = data.id();
                let payload = self.registry.encode(data)?;
                let entries = crate::saga::index_entries(data, correlation);

                let mut tx = self.pool.begin().await?;

                let sql = <$db_type>::build_insert(self.insert_data(
                    &saga_id.to_string(),
                    data.revision(),
                    payload,
                ));
                sqlx::query(&sql).execute(&mut *tx).await.map_err(|e| {
                    super::conflict_on_unique_violation(
                        e,
                        saga_id,
                        "a saga with this id already exists",
                    )
                })?;

                self.insert_index_entries(&mut tx, saga_id, &entries).await?;

                tx.commit().await?;

                tracing::debug!(
                    %saga_id,
                    saga_type = data.saga_type(),
                    index_entries = entries.len(),
                    "Inserted saga"
                );
                Ok(())
            }

            async fn update(
                &self,
                data: &mut dyn crate::saga::SagaData,
                correlation: &[crate::saga::CorrelationProperty],
            ) -> crate::storage::Result<()> {
                let revision = data.revision();
                data.set_revision(revision + 1);

                let result = self.try_update(&*data, revision, correlation).await;
                match &result {
                    Ok(()) => tracing::debug!(
                        saga_id = %data.id(),
                        revision = revision + 1,
                        "Updated saga"
                    ),
                    Err(_) => data.set_revision(revision),
                }
                result
            }

            async fn delete(
                &self,
                data: &mut dyn crate::saga::SagaData,
            ) -> crate::storage::Result<()> {
                let saga_id = data.id();
                let id = saga_id.to_string();
                let revision = data.revision();

                let mut tx = self.pool.begin().await?;

                let sql = <$db_type>::build_delete(self.delete_data(&id, revision));
                let result = sqlx::query(&sql).execute(&mut *tx).await?;
                if result.rows_affected() == 0 {
                    tracing::warn!(%saga_id, revision, "Saga delete lost the race");
                    return Err(StorageError::conflict(
                        saga_id,
                        format!("revision {} is stale or the saga was already deleted", revision),
                    ));
                }

                let sql = <$db_type>::build_delete(self.delete_index(&id));
                sqlx::query(&sql).execute(&mut *tx).await?;

                tx.commit().await?;

                data.set_revision(revision + 1);
                tracing::debug!(%saga_id, revision, "Deleted saga");
                Ok(())
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_saga_storage!(super::postgres::Postgres, sqlx::PgConnection, "postgres");
impl_saga_storage!(super::sqlite::Sqlite, sqlx::SqliteConnection, "sqlite");
