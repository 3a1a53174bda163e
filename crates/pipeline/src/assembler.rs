//! Album reconstruction.
//!
//! A grouped message triggers a one-shot scan of the chat's recent history
//! for siblings sharing its group id. Whatever the scan finds, plus any parts
//! ingested while it was running, becomes one post. The album key is then
//! remembered so that parts arriving afterwards are dropped instead of
//! producing a second post.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use {
    postwatch_channels::MessageHistory,
    postwatch_common::{ChatId, InboundMessage, MessageId, Post},
    postwatch_config::PipelineConfig,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    recent::RecentKeys,
};

type AlbumKey = (ChatId, String);

struct State {
    /// Gathers currently waiting on a range query.
    in_flight: HashMap<AlbumKey, Vec<InboundMessage>>,
    completed_albums: RecentKeys<AlbumKey>,
    emitted_singles: RecentKeys<(ChatId, MessageId)>,
}

/// Turns inbound messages into complete posts, each exactly once.
pub struct PostAssembler {
    history: Arc<dyn MessageHistory>,
    scan_window: i32,
    scan_limit: usize,
    state: Mutex<State>,
}

impl PostAssembler {
    pub fn new(history: Arc<dyn MessageHistory>, config: &PipelineConfig) -> Self {
        Self {
            history,
            scan_window: config.album_scan_window,
            scan_limit: config.album_scan_limit,
            state: Mutex::new(State {
                in_flight: HashMap::new(),
                completed_albums: RecentKeys::new(config.album_memory),
                emitted_singles: RecentKeys::new(config.album_memory),
            }),
        }
    }

    /// Feed one message. Returns the completed post, or `None` when the
    /// message was absorbed into another post or already seen.
    pub async fn ingest(&self, msg: InboundMessage) -> Option<Post> {
        let Some(group_id) = msg.group_id.clone() else {
            return self.single(msg);
        };
        let key: AlbumKey = (msg.chat_id, group_id);

        {
            let mut state = self.lock();
            if state.completed_albums.contains(&key) {
                debug!(chat_id = msg.chat_id, msg_id = msg.id, group_id = %key.1, "late album part dropped");
                return None;
            }
            if let Some(parts) = state.in_flight.get_mut(&key) {
                debug!(chat_id = msg.chat_id, msg_id = msg.id, group_id = %key.1, "album part joined running gather");
                parts.push(msg);
                return None;
            }
            state.in_flight.insert(key.clone(), vec![msg.clone()]);
        }

        let (siblings, complete) = match self.scan(&msg, &key.1).await {
            Ok(found) => (found, true),
            Err(e) => {
                warn!(error = %e, "emitting album with trigger message only");
                (Vec::new(), false)
            },
        };

        let mut parts = {
            let mut state = self.lock();
            state.completed_albums.insert(key.clone());
            state.in_flight.remove(&key).unwrap_or_default()
        };
        parts.extend(siblings);

        let mut post = Post::from_album(parts)?;
        post.is_complete = complete;
        info!(
            chat_id = post.chat_id,
            post_id = post.primary_id,
            group_id = %key.1,
            media = post.media_refs.len(),
            complete,
            "album assembled"
        );
        Some(post)
    }

    fn single(&self, msg: InboundMessage) -> Option<Post> {
        if !self.lock().emitted_singles.insert((msg.chat_id, msg.id)) {
            debug!(chat_id = msg.chat_id, msg_id = msg.id, "duplicate message dropped");
            return None;
        }
        let post = Post::from_message(msg);
        debug!(chat_id = post.chat_id, post_id = post.primary_id, "single post");
        Some(post)
    }

    /// Collect siblings of `trigger` within `±scan_window` ids.
    async fn scan(&self, trigger: &InboundMessage, group_id: &str) -> Result<Vec<InboundMessage>> {
        if self.scan_window <= 0 || self.scan_limit == 0 {
            return Ok(Vec::new());
        }
        let min_id = trigger.id.saturating_sub(self.scan_window).max(1);
        let max_id = trigger.id.saturating_add(self.scan_window);

        let found = self
            .history
            .get_messages(trigger.chat_id, min_id, max_id, self.scan_limit)
            .await
            .map_err(|source| Error::Assembly {
                chat_id: trigger.chat_id,
                group_id: group_id.to_string(),
                source,
            })?;

        Ok(found
            .into_iter()
            .filter(|m| m.chat_id == trigger.chat_id && m.group_id.as_deref() == Some(group_id))
            .collect())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
