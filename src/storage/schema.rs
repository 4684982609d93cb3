//! Database schema definitions using sea-query.
//!
//! Column identifiers for type-safe query building, plus the DDL for each
//! table. Table names are configurable, so tables are addressed through
//! `Alias` rather than an `Iden` variant.

use sea_query::{Alias, ColumnDef, Index, IndexCreateStatement, Table, TableCreateStatement};

/// Saga data table columns.
#[derive(sea_query::Iden)]
pub enum Sagas {
    #[iden = "id"]
    Id,
    #[iden = "revision"]
    Revision,
    #[iden = "data"]
    Data,
}

/// Saga correlation index table columns.
#[derive(sea_query::Iden)]
pub enum SagaIndex {
    #[iden = "saga_type"]
    SagaType,
    #[iden = "key"]
    Key,
    #[iden = "value"]
    Value,
    #[iden = "saga_id"]
    SagaId,
}

/// Subscriptions table columns.
#[derive(sea_query::Iden)]
pub enum Subscriptions {
    #[iden = "topic"]
    Topic,
    #[iden = "address"]
    Address,
}

/// Saga snapshots table columns.
#[derive(sea_query::Iden)]
pub enum SagaSnapshots {
    #[iden = "id"]
    Id,
    #[iden = "revision"]
    Revision,
    #[iden = "data"]
    Data,
    #[iden = "metadata"]
    Metadata,
    #[iden = "created_at"]
    CreatedAt,
}

/// `(id PK, revision, data)`.
pub fn create_sagas_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(ColumnDef::new(Sagas::Id).string().not_null().primary_key())
        .col(ColumnDef::new(Sagas::Revision).integer().not_null())
        .col(ColumnDef::new(Sagas::Data).blob().not_null())
        .to_owned()
}

/// `(saga_type, key, value, saga_id)` with primary key `(key, value, saga_type)`.
///
/// The primary key is what makes two live sagas of one type unable to share
/// a correlation value.
pub fn create_saga_index_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(ColumnDef::new(SagaIndex::SagaType).string().not_null())
        .col(ColumnDef::new(SagaIndex::Key).string().not_null())
        .col(ColumnDef::new(SagaIndex::Value).string().not_null())
        .col(ColumnDef::new(SagaIndex::SagaId).string().not_null())
        .primary_key(
            Index::create()
                .col(SagaIndex::Key)
                .col(SagaIndex::Value)
                .col(SagaIndex::SagaType),
        )
        .to_owned()
}

/// Non-unique index on `saga_id` for per-saga cleanup.
pub fn create_saga_index_id_index(table: &str) -> IndexCreateStatement {
    Index::create()
        .if_not_exists()
        .name(format!("{table}_saga_id_idx"))
        .table(Alias::new(table))
        .col(SagaIndex::SagaId)
        .to_owned()
}

/// `(topic, address)` with both columns as primary key.
pub fn create_subscriptions_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(ColumnDef::new(Subscriptions::Topic).string().not_null())
        .col(ColumnDef::new(Subscriptions::Address).string().not_null())
        .primary_key(
            Index::create()
                .col(Subscriptions::Topic)
                .col(Subscriptions::Address),
        )
        .to_owned()
}

/// `(id, revision, data, metadata, created_at)` with primary key `(id, revision)`.
pub fn create_saga_snapshots_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(ColumnDef::new(SagaSnapshots::Id).string().not_null())
        .col(ColumnDef::new(SagaSnapshots::Revision).integer().not_null())
        .col(ColumnDef::new(SagaSnapshots::Data).blob().not_null())
        .col(ColumnDef::new(SagaSnapshots::Metadata).text().not_null())
        .col(ColumnDef::new(SagaSnapshots::CreatedAt).string().not_null())
        .primary_key(
            Index::create()
                .col(SagaSnapshots::Id)
                .col(SagaSnapshots::Revision),
        )
        .to_owned()
}
