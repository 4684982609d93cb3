//! SagaSnapshotStorage trait definition.

use std::collections::BTreeMap;

use async_trait::async_trait;
use uuid::Uuid;

use super::Result;
use crate::saga::SagaData;

/// A stored copy of saga data at one revision.
#[derive(Debug)]
pub struct SagaSnapshot {
    pub data: Box<dyn SagaData>,
    pub metadata: BTreeMap<String, String>,
}

/// Interface for saga snapshot persistence.
///
/// An append-only audit trail: every saved snapshot is keyed by
/// `(saga id, revision)` and never modified afterwards. Metadata typically
/// records the handler and message that produced the revision.
///
/// # Implementations
///
/// - `PostgresSagaSnapshotStorage`: PostgreSQL storage
/// - `SqliteSagaSnapshotStorage`: SQLite storage
/// - `MockSagaSnapshotStorage`: In-memory mock for testing
#[async_trait]
pub trait SagaSnapshotStorage: Send + Sync {
    /// Create the snapshot table if it does not exist.
    async fn ensure_schema(&self) -> Result<()>;

    /// Append a snapshot of `data` at its current revision.
    ///
    /// Saving the same `(id, revision)` twice is a concurrency conflict.
    async fn save(&self, data: &dyn SagaData, metadata: &BTreeMap<String, String>) -> Result<()>;

    /// Load the snapshot of saga `id` at `revision`.
    async fn load(&self, id: Uuid, revision: i32) -> Result<Option<SagaSnapshot>>;

    /// All snapshots of saga `id`, oldest revision first.
    async fn list(&self, id: Uuid) -> Result<Vec<SagaSnapshot>>;
}
