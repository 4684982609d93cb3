//! Mock SagaStorage implementation for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::saga::{
    index_entries, CorrelationProperty, IndexEntry, SagaData, SagaRegistry, ID_PROPERTY,
};
use crate::storage::saga_store::validate_insert;
use crate::storage::{Result, SagaStorage, StorageError};

/// Key type for the correlation index: (saga_type, key, value).
type IndexKey = (String, String, String);

struct StoredSaga {
    revision: i32,
    payload: Vec<u8>,
}

#[derive(Default)]
struct State {
    sagas: HashMap<Uuid, StoredSaga>,
    index: HashMap<IndexKey, Uuid>,
}

impl State {
    /// First index key in `entries` already owned by a saga other than `owner`.
    fn find_collision(&self, owner: Uuid, entries: &[IndexEntry]) -> Option<&IndexKey> {
        entries.iter().find_map(|entry| {
            let (key, existing) = self.index.get_key_value(&index_key(entry))?;
            (*existing != owner).then_some(key)
        })
    }

    fn replace_index(&mut self, owner: Uuid, entries: &[IndexEntry]) {
        self.index.retain(|_, id| *id != owner);
        for entry in entries {
            self.index.insert(index_key(entry), owner);
        }
    }
}

fn index_key(entry: &IndexEntry) -> IndexKey {
    (
        entry.saga_type.clone(),
        entry.key.clone(),
        entry.value.clone(),
    )
}

fn collision(saga_id: Uuid, key: &IndexKey) -> StorageError {
    StorageError::conflict(
        saga_id,
        format!(
            "correlation value {}={} already owned by another {} saga",
            key.1, key.2, key.0
        ),
    )
}

/// Mock saga storage that keeps sagas and their index in memory.
pub struct MockSagaStorage {
    registry: Arc<SagaRegistry>,
    state: RwLock<State>,
}

impl MockSagaStorage {
    pub fn new(registry: Arc<SagaRegistry>) -> Self {
        Self {
            registry,
            state: RwLock::new(State::default()),
        }
    }

    pub async fn stored_count(&self) -> usize {
        self.state.read().await.sagas.len()
    }

    pub async fn stored_revision(&self, id: Uuid) -> Option<i32> {
        self.state.read().await.sagas.get(&id).map(|s| s.revision)
    }

    /// Index entries currently owned by saga `id`, as (key, value) pairs.
    pub async fn index_entries_for(&self, id: Uuid) -> Vec<(String, String)> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .index
            .iter()
            .filter(|(_, owner)| **owner == id)
            .map(|((_, key, value), _)| (key.clone(), value.clone()))
            .collect();
        entries.sort();
        entries
    }
}

#[async_trait]
impl SagaStorage for MockSagaStorage {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn find(
        &self,
        saga_type: &str,
        property: &str,
        value: Option<&str>,
    ) -> Result<Option<Box<dyn SagaData>>> {
        let value = value.unwrap_or_default();
        let state = self.state.read().await;

        let id = if property == ID_PROPERTY {
            Uuid::parse_str(value).map_err(|_| StorageError::InvalidId {
                value: value.to_string(),
            })?
        } else {
            let key = (
                saga_type.to_string(),
                property.to_string(),
                value.to_string(),
            );
            match state.index.get(&key) {
                Some(id) => *id,
                None => return Ok(None),
            }
        };

        match state.sagas.get(&id) {
            Some(stored) => {
                self.registry
                    .decode_as_type(saga_type, &id.to_string(), &stored.payload)
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, data: &dyn SagaData, correlation: &[CorrelationProperty]) -> Result<()> {
        validate_insert(data)?;

        let saga_id = data.id();
        let payload = self.registry.encode(data)?;
        let entries = index_entries(data, correlation);

        let mut state = self.state.write().await;
        if state.sagas.contains_key(&saga_id) {
            return Err(StorageError::conflict(
                saga_id,
                "a saga with this id already exists",
            ));
        }
        if let Some(key) = state.find_collision(saga_id, &entries) {
            return Err(collision(saga_id, key));
        }

        state.sagas.insert(
            saga_id,
            StoredSaga {
                revision: data.revision(),
                payload,
            },
        );
        state.replace_index(saga_id, &entries);
        Ok(())
    }

    async fn update(
        &self,
        data: &mut dyn SagaData,
        correlation: &[CorrelationProperty],
    ) -> Result<()> {
        let saga_id = data.id();
        let revision = data.revision();

        data.set_revision(revision + 1);
        let encoded = self.registry.encode(&*data);
        let entries = index_entries(&*data, correlation);
        data.set_revision(revision);
        let payload = encoded?;

        let mut state = self.state.write().await;
        match state.sagas.get(&saga_id) {
            Some(stored) if stored.revision == revision => {}
            _ => {
                return Err(StorageError::conflict(
                    saga_id,
                    format!("revision {} is stale or the saga was deleted", revision),
                ))
            }
        }
        if let Some(key) = state.find_collision(saga_id, &entries) {
            return Err(collision(saga_id, key));
        }

        state.sagas.insert(
            saga_id,
            StoredSaga {
                revision: revision + 1,
                payload,
            },
        );
        state.replace_index(saga_id, &entries);
        data.set_revision(revision + 1);
        Ok(())
    }

    async fn delete(&self, data: &mut dyn SagaData) -> Result<()> {
        let saga_id = data.id();
        let revision = data.revision();

        let mut state = self.state.write().await;
        match state.sagas.get(&saga_id) {
            Some(stored) if stored.revision == revision => {}
            _ => {
                return Err(StorageError::conflict(
                    saga_id,
                    format!(
                        "revision {} is stale or the saga was already deleted",
                        revision
                    ),
                ))
            }
        }

        state.sagas.remove(&saga_id);
        state.replace_index(saga_id, &[]);
        data.set_revision(revision + 1);
        Ok(())
    }
}
