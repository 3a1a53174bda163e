use {
    async_trait::async_trait,
    postwatch_common::{ChatId, InboundMessage, MediaRef, MessageId, SubscriberId},
};

use crate::Result;

// ── Inbound ─────────────────────────────────────────────────────────────────

/// Bounded range query over a chat's recent messages.
///
/// Used by the album assembler to collect the siblings of a grouped message
/// without waiting for further push events.
#[async_trait]
pub trait MessageHistory: Send + Sync {
    /// Return messages of `chat_id` with `min_id <= id <= max_id`, ascending by
    /// id, at most `limit` of them.
    async fn get_messages(
        &self,
        chat_id: ChatId,
        min_id: MessageId,
        max_id: MessageId,
        limit: usize,
    ) -> Result<Vec<InboundMessage>>;
}

/// Receiver of inbound messages. The platform adapter calls this once per
/// message, in the order the platform delivered them.
#[async_trait]
pub trait InboundSink: Send + Sync {
    async fn ingest(&self, msg: InboundMessage);
}

/// Download access to platform-hosted media.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, media: &MediaRef) -> Result<Vec<u8>>;
}

// ── Outbound ────────────────────────────────────────────────────────────────

/// Photo bytes ready for upload.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// One entry of a photo group. Platforms only display the caption of the
/// first entry.
#[derive(Debug, Clone)]
pub struct GroupItem {
    pub photo: PhotoUpload,
    pub caption: Option<String>,
}

/// Send primitive towards subscriber inboxes.
///
/// Every method fails with a [`crate::Error`] on transport or rate-limit
/// failure. Implementations must not retry on their own.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, to: SubscriberId, text: &str) -> Result<()>;
    async fn send_photo(&self, to: SubscriberId, photo: PhotoUpload, caption: &str) -> Result<()>;
    async fn send_photo_group(&self, to: SubscriberId, items: Vec<GroupItem>) -> Result<()>;
}
