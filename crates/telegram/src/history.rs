//! Recent channel posts, kept so album siblings can be looked up by id range.
//!
//! The Bot API has no history query, so every post the poller sees is
//! recorded here before it is ingested.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use {
    async_trait::async_trait,
    postwatch_channels::{MessageHistory, Result},
    postwatch_common::{ChatId, InboundMessage, MessageId},
};

pub struct RecentHistory {
    per_chat: usize,
    chats: Mutex<HashMap<ChatId, BTreeMap<MessageId, InboundMessage>>>,
}

impl RecentHistory {
    /// Keep at most `per_chat` messages (the highest ids) for each chat.
    pub fn new(per_chat: usize) -> Self {
        Self {
            per_chat,
            chats: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, batch: &[InboundMessage]) {
        if self.per_chat == 0 {
            return;
        }
        let mut chats = self.chats.lock().unwrap_or_else(|e| e.into_inner());
        for msg in batch {
            let recent = chats.entry(msg.chat_id).or_default();
            recent.insert(msg.id, msg.clone());
            while recent.len() > self.per_chat {
                recent.pop_first();
            }
        }
    }

    pub fn len(&self, chat_id: ChatId) -> usize {
        self.chats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&chat_id)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl MessageHistory for RecentHistory {
    async fn get_messages(
        &self,
        chat_id: ChatId,
        min_id: MessageId,
        max_id: MessageId,
        limit: usize,
    ) -> Result<Vec<InboundMessage>> {
        if min_id > max_id {
            return Ok(Vec::new());
        }
        let chats = self.chats.lock().unwrap_or_else(|e| e.into_inner());
        Ok(chats
            .get(&chat_id)
            .map(|recent| {
                recent
                    .range(min_id..=max_id)
                    .take(limit)
                    .map(|(_, msg)| msg.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
