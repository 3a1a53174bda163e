use std::{collections::HashMap, sync::RwLock};

use {async_trait::async_trait, postwatch_common::SubscriberId};

use crate::config::SubscriberConfig;

/// Point-in-time copy of every subscriber's filters.
pub type Snapshot = HashMap<SubscriberId, SubscriberConfig>;

/// Read contract consumed by the pipeline: one snapshot per post.
///
/// Later edits are not visible to a snapshot already taken.
#[async_trait]
pub trait SubscriberRegistry: Send + Sync {
    async fn get_all(&self) -> Snapshot;
}

/// Registry held purely in memory.
#[derive(Default)]
pub struct MemoryRegistry {
    subscribers: RwLock<Snapshot>,
}

impl MemoryRegistry {
    pub fn new(subscribers: impl IntoIterator<Item = SubscriberConfig>) -> Self {
        Self {
            subscribers: RwLock::new(
                subscribers
                    .into_iter()
                    .map(|s| (s.subscriber_id, s))
                    .collect(),
            ),
        }
    }

    pub fn upsert(&self, config: SubscriberConfig) {
        let mut map = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        map.insert(config.subscriber_id, config);
    }
}

#[async_trait]
impl SubscriberRegistry for MemoryRegistry {
    async fn get_all(&self) -> Snapshot {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
