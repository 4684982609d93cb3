//! Unified SQL SubscriptionStorage implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety.

use std::marker::PhantomData;

use sea_query::{
    Alias, DeleteStatement, Expr, InsertStatement, OnConflict, Order, Query, SelectStatement,
};

use super::SqlDatabase;
use crate::storage::schema::Subscriptions;

/// SQL-based implementation of SubscriptionStorage.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlSubscriptionStorage<DB: SqlDatabase> {
    pool: DB::Pool,
    table: String,
    centralized: bool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlSubscriptionStorage<DB> {
    /// Create a new SQL subscription storage with the given pool.
    pub fn new(pool: DB::Pool, table: &str, centralized: bool) -> Self {
        Self {
            pool,
            table: table.to_string(),
            centralized,
            _marker: PhantomData,
        }
    }

    fn select_addresses(&self, topic: &str) -> SelectStatement {
        Query::select()
            .column(Subscriptions::Address)
            .from(Alias::new(&self.table))
            .and_where(Expr::col(Subscriptions::Topic).eq(topic))
            .order_by(Subscriptions::Address, Order::Asc)
            .to_owned()
    }

    fn insert_subscription(&self, topic: &str, address: &str) -> InsertStatement {
        Query::insert()
            .into_table(Alias::new(&self.table))
            .columns([Subscriptions::Topic, Subscriptions::Address])
            .values_panic([topic.into(), address.into()])
            .on_conflict(
                OnConflict::columns([Subscriptions::Topic, Subscriptions::Address])
                    .do_nothing()
                    .to_owned(),
            )
            .to_owned()
    }

    fn delete_subscription(&self, topic: &str, address: &str) -> DeleteStatement {
        Query::delete()
            .from_table(Alias::new(&self.table))
            .and_where(Expr::col(Subscriptions::Topic).eq(topic))
            .and_where(Expr::col(Subscriptions::Address).eq(address))
            .to_owned()
    }
}

/// Macro to implement SubscriptionStorage for a specific SQL backend.
macro_rules! impl_subscription_storage {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::SubscriptionStorage for SqlSubscriptionStorage<$db_type> {
            async fn ensure_schema(&self) -> crate::storage::Result<()> {
                use crate::storage::schema::create_subscriptions_table;

                let sql = <$db_type>::build_table_create(create_subscriptions_table(&self.table));
                sqlx::query(&sql).execute(&self.pool).await?;

                tracing::debug!(table = %self.table, "Subscription table ready");
                Ok(())
            }

            async fn get_subscriber_addresses(
                &self,
                topic: &str,
            ) -> crate::storage::Result<Vec<String>> {
                use sqlx::Row;

                let sql = <$db_type>::build_select(self.select_addresses(topic));
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                Ok(rows.iter().map(|row| row.get("address")).collect())
            }

            async fn register_subscriber(
                &self,
                topic: &str,
                address: &str,
            ) -> crate::storage::Result<()> {
                let sql = <$db_type>::build_insert(self.insert_subscription(topic, address));
                sqlx::query(&sql).execute(&self.pool).await?;

                tracing::debug!(topic, address, "Registered subscriber");
                Ok(())
            }

            async fn unregister_subscriber(
                &self,
                topic: &str,
                address: &str,
            ) -> crate::storage::Result<()> {
                let sql = <$db_type>::build_delete(self.delete_subscription(topic, address));

                match sqlx::query(&sql).execute(&self.pool).await {
                    Ok(_) => tracing::debug!(topic, address, "Unregistered subscriber"),
                    Err(e) => tracing::warn!(
                        topic,
                        address,
                        error = %e,
                        "Could not unregister subscriber; continuing"
                    ),
                }
                Ok(())
            }

            fn is_centralized(&self) -> bool {
                self.centralized
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_subscription_storage!(super::postgres::Postgres, "postgres");
impl_subscription_storage!(super::sqlite::Sqlite, "sqlite");
