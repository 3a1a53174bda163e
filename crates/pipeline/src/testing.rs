//! In-process doubles for the platform seams.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use {
    async_trait::async_trait,
    postwatch_channels::{
        ChannelOutbound, Error as ChannelError, GroupItem, MediaFetcher, MessageHistory,
        PhotoUpload, Result as ChannelResult,
    },
    postwatch_common::{ChatId, InboundMessage, MediaRef, MessageId, SubscriberId},
    tokio::sync::Notify,
};

pub(crate) const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// History answering range queries from a fixed message list.
#[derive(Default)]
pub(crate) struct ScriptedHistory {
    messages: Vec<InboundMessage>,
    fail: bool,
    pub(crate) calls: Mutex<Vec<(ChatId, MessageId, MessageId, usize)>>,
    gate: Option<(Notify, Notify)>,
}

impl ScriptedHistory {
    pub(crate) fn new(messages: impl IntoIterator<Item = InboundMessage>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
            ..Default::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Block each query until [`Self::release`] is called. [`Self::entered`]
    /// resolves once a query is waiting.
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some((Notify::new(), Notify::new()));
        self
    }

    pub(crate) async fn entered(&self) {
        if let Some((entered, _)) = &self.gate {
            entered.notified().await;
        }
    }

    pub(crate) fn release(&self) {
        if let Some((_, release)) = &self.gate {
            release.notify_one();
        }
    }

    pub(crate) fn calls(&self) -> Vec<(ChatId, MessageId, MessageId, usize)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MessageHistory for ScriptedHistory {
    async fn get_messages(
        &self,
        chat_id: ChatId,
        min_id: MessageId,
        max_id: MessageId,
        limit: usize,
    ) -> ChannelResult<Vec<InboundMessage>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((chat_id, min_id, max_id, limit));
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        if self.fail {
            return Err(ChannelError::unavailable("history offline"));
        }
        let mut found: Vec<_> = self
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id && (min_id..=max_id).contains(&m.id))
            .cloned()
            .collect();
        found.sort_by_key(|m| m.id);
        found.truncate(limit);
        Ok(found)
    }
}

/// Fetcher serving JPEG bytes for every file id except the failing ones.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    failing: HashSet<String>,
    pub(crate) fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub(crate) fn failing_on(file_id: &str) -> Self {
        Self {
            failing: HashSet::from([file_id.to_string()]),
            ..Default::default()
        }
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, media: &MediaRef) -> ChannelResult<Vec<u8>> {
        self.fetched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(media.file_id.clone());
        if self.failing.contains(&media.file_id) {
            return Err(ChannelError::unavailable(format!(
                "file {} expired",
                media.file_id
            )));
        }
        Ok(JPEG.to_vec())
    }
}

/// What the recording outbound saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Sent {
    Text {
        text: String,
    },
    Photo {
        file_name: String,
        caption: String,
    },
    Group {
        file_names: Vec<String>,
        captions: Vec<Option<String>>,
    },
}

/// Outbound that records sends and fails for chosen recipients.
#[derive(Default)]
pub(crate) struct RecordingOutbound {
    failing: HashSet<SubscriberId>,
    sent: Mutex<HashMap<SubscriberId, Vec<Sent>>>,
}

impl RecordingOutbound {
    pub(crate) fn failing_for(ids: impl IntoIterator<Item = SubscriberId>) -> Self {
        Self {
            failing: ids.into_iter().collect(),
            ..Default::default()
        }
    }

    pub(crate) fn sent_to(&self, to: SubscriberId) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&to)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn total(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(Vec::len)
            .sum()
    }

    fn record(&self, to: SubscriberId, sent: Sent) -> ChannelResult<()> {
        if self.failing.contains(&to) {
            return Err(ChannelError::RateLimited {
                retry_after_secs: 30,
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(to)
            .or_default()
            .push(sent);
        Ok(())
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn send_text(&self, to: SubscriberId, text: &str) -> ChannelResult<()> {
        self.record(to, Sent::Text {
            text: text.to_string(),
        })
    }

    async fn send_photo(
        &self,
        to: SubscriberId,
        photo: PhotoUpload,
        caption: &str,
    ) -> ChannelResult<()> {
        self.record(to, Sent::Photo {
            file_name: photo.file_name,
            caption: caption.to_string(),
        })
    }

    async fn send_photo_group(&self, to: SubscriberId, items: Vec<GroupItem>) -> ChannelResult<()> {
        let (file_names, captions) = items
            .into_iter()
            .map(|item| (item.photo.file_name, item.caption))
            .unzip();
        self.record(to, Sent::Group {
            file_names,
            captions,
        })
    }
}

/// The three-part `@jobs` album used across tests.
pub(crate) fn jobs_album() -> Vec<InboundMessage> {
    vec![
        InboundMessage::new(100, -1001)
            .with_handle("@jobs")
            .with_group("g1")
            .with_media("m100"),
        InboundMessage::new(101, -1001)
            .with_handle("@jobs")
            .with_group("g1")
            .with_media("m101"),
        InboundMessage::new(102, -1001)
            .with_handle("@jobs")
            .with_group("g1")
            .with_media("m102")
            .with_caption("data analyst role"),
    ]
}
