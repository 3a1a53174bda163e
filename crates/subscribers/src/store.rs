//! Flat-file subscriber registry.
//!
//! The file is a JSON object keyed by stringified subscriber id:
//!
//! ```json
//! { "123": { "channels": ["@jobs"], "keywords": ["rust"], "active": true, "state": "active" } }
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::RwLock,
};

use {
    async_trait::async_trait,
    postwatch_common::SubscriberId,
    tracing::{debug, info},
};

use crate::{
    config::SubscriberConfig,
    error::{Context, Result},
    registry::{Snapshot, SubscriberRegistry},
};

/// Registry persisted to a JSON file after every mutation.
pub struct JsonFileRegistry {
    path: PathBuf,
    subscribers: RwLock<Snapshot>,
}

impl JsonFileRegistry {
    /// Load the registry from `path`. A missing file yields an empty registry;
    /// an unreadable or malformed file is an error so it never gets
    /// overwritten with an empty map.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let subscribers = if path.exists() {
            let loaded = load(&path)?;
            info!(path = %path.display(), count = loaded.len(), "loaded subscriber settings");
            loaded
        } else {
            info!(path = %path.display(), "subscriber settings file not found, starting empty");
            HashMap::new()
        };
        Ok(Self {
            path,
            subscribers: RwLock::new(subscribers),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, subscriber_id: SubscriberId) -> Option<SubscriberConfig> {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&subscriber_id)
            .cloned()
    }

    /// Fetch a subscriber, creating and persisting an inactive entry on
    /// first contact.
    pub fn get_or_create(&self, subscriber_id: SubscriberId) -> Result<SubscriberConfig> {
        let mut map = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = map.get(&subscriber_id) {
            return Ok(existing.clone());
        }
        let created = SubscriberConfig::new(subscriber_id);
        map.insert(subscriber_id, created.clone());
        save(&self.path, &map)?;
        Ok(created)
    }

    /// Replace a subscriber's settings and persist.
    pub fn update(&self, config: SubscriberConfig) -> Result<()> {
        let mut map = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        map.insert(config.subscriber_id, config);
        save(&self.path, &map)
    }

    /// All subscribers sorted by id.
    pub fn list(&self) -> Vec<SubscriberConfig> {
        let map = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<_> = map.values().cloned().collect();
        all.sort_by_key(|s| s.subscriber_id);
        all
    }
}

#[async_trait]
impl SubscriberRegistry for JsonFileRegistry {
    async fn get_all(&self) -> Snapshot {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn load(path: &Path) -> Result<Snapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: HashMap<String, SubscriberConfig> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    parsed
        .into_iter()
        .map(|(key, mut config)| -> Result<(SubscriberId, SubscriberConfig)> {
            let id: SubscriberId = key
                .parse()
                .with_context(|| format!("invalid subscriber id {key:?}"))?;
            config.subscriber_id = id;
            Ok((id, config))
        })
        .collect()
}

/// Write to a sibling temp file, then rename over the target.
fn save(path: &Path, subscribers: &Snapshot) -> Result<()> {
    let ordered: BTreeMap<String, &SubscriberConfig> = subscribers
        .iter()
        .map(|(id, cfg)| (id.to_string(), cfg))
        .collect();
    let json = serde_json::to_string_pretty(&ordered)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    debug!(path = %path.display(), count = subscribers.len(), "saved subscriber settings");
    Ok(())
}
