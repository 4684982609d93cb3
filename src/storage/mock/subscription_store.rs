//! Mock SubscriptionStorage implementation for testing.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::{Result, SubscriptionStorage};

/// Mock subscription storage that keeps topic subscribers in memory.
#[derive(Default)]
pub struct MockSubscriptionStorage {
    subscribers: RwLock<HashMap<String, BTreeSet<String>>>,
    centralized: bool,
}

impl MockSubscriptionStorage {
    pub fn new(centralized: bool) -> Self {
        Self {
            subscribers: RwLock::default(),
            centralized,
        }
    }

    pub async fn topic_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[async_trait]
impl SubscriptionStorage for MockSubscriptionStorage {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn get_subscriber_addresses(&self, topic: &str) -> Result<Vec<String>> {
        let subscribers = self.subscribers.read().await;
        Ok(subscribers
            .get(topic)
            .map(|addresses| addresses.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn register_subscriber(&self, topic: &str, address: &str) -> Result<()> {
        self.subscribers
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .insert(address.to_string());
        Ok(())
    }

    async fn unregister_subscriber(&self, topic: &str, address: &str) -> Result<()> {
        let mut subscribers = self.subscribers.write().await;
        if let Some(addresses) = subscribers.get_mut(topic) {
            addresses.remove(address);
            if addresses.is_empty() {
                subscribers.remove(topic);
            }
        }
        Ok(())
    }

    fn is_centralized(&self) -> bool {
        self.centralized
    }
}
