//! SubscriptionStorage trait definition.

use async_trait::async_trait;

use super::Result;

/// Interface for topic subscription persistence.
///
/// Maps a topic to the set of subscriber input queue addresses.
///
/// # Implementations
///
/// - `PostgresSubscriptionStorage`: PostgreSQL storage
/// - `SqliteSubscriptionStorage`: SQLite storage
/// - `MockSubscriptionStorage`: In-memory mock for testing
#[async_trait]
pub trait SubscriptionStorage: Send + Sync {
    /// Create the subscription table if it does not exist.
    async fn ensure_schema(&self) -> Result<()>;

    /// Addresses subscribed to `topic`, sorted.
    async fn get_subscriber_addresses(&self, topic: &str) -> Result<Vec<String>>;

    /// Subscribe `address` to `topic`. Registering twice is a no-op.
    async fn register_subscriber(&self, topic: &str, address: &str) -> Result<()>;

    /// Unsubscribe `address` from `topic`.
    ///
    /// Best-effort: failures are logged and swallowed, and removing an absent
    /// subscription succeeds.
    async fn unregister_subscriber(&self, topic: &str, address: &str) -> Result<()>;

    /// Whether every endpoint shares this subscription table.
    fn is_centralized(&self) -> bool;
}
