//! Mock SagaSnapshotStorage implementation for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::saga::{SagaData, SagaRegistry};
use crate::storage::{Result, SagaSnapshot, SagaSnapshotStorage, StorageError};

struct StoredSnapshot {
    payload: Vec<u8>,
    metadata: BTreeMap<String, String>,
}

/// Mock snapshot storage that keeps encoded snapshots in memory.
pub struct MockSagaSnapshotStorage {
    registry: Arc<SagaRegistry>,
    snapshots: RwLock<HashMap<Uuid, BTreeMap<i32, StoredSnapshot>>>,
}

impl MockSagaSnapshotStorage {
    pub fn new(registry: Arc<SagaRegistry>) -> Self {
        Self {
            registry,
            snapshots: RwLock::default(),
        }
    }

    pub async fn stored_count(&self) -> usize {
        self.snapshots.read().await.values().map(BTreeMap::len).sum()
    }

    fn to_snapshot(&self, id: Uuid, stored: &StoredSnapshot) -> Result<SagaSnapshot> {
        Ok(SagaSnapshot {
            data: self.registry.decode(&id.to_string(), &stored.payload)?,
            metadata: stored.metadata.clone(),
        })
    }
}

#[async_trait]
impl SagaSnapshotStorage for MockSagaSnapshotStorage {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self, data: &dyn SagaData, metadata: &BTreeMap<String, String>) -> Result<()> {
        let saga_id = data.id();
        let revision = data.revision();
        let payload = self.registry.encode(data)?;

        let mut snapshots = self.snapshots.write().await;
        let revisions = snapshots.entry(saga_id).or_default();
        if revisions.contains_key(&revision) {
            return Err(StorageError::conflict(
                saga_id,
                format!("snapshot for revision {} already saved", revision),
            ));
        }
        revisions.insert(
            revision,
            StoredSnapshot {
                payload,
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    async fn load(&self, id: Uuid, revision: i32) -> Result<Option<SagaSnapshot>> {
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(&id)
            .and_then(|revisions| revisions.get(&revision))
            .map(|stored| self.to_snapshot(id, stored))
            .transpose()
    }

    async fn list(&self, id: Uuid) -> Result<Vec<SagaSnapshot>> {
        let snapshots = self.snapshots.read().await;
        match snapshots.get(&id) {
            Some(revisions) => revisions
                .values()
                .map(|stored| self.to_snapshot(id, stored))
                .collect(),
            None => Ok(vec![]),
        }
    }
}
