//! Domain types shared by the pipeline and the platform adapters.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Platform chat identifier (Telegram channel ids are negative, `-100…`).
pub type ChatId = i64;

/// Per-chat message identifier.
pub type MessageId = i32;

/// Recipient identifier; for Telegram this is the subscriber's user id.
pub type SubscriberId = i64;

/// Telegram prefixes supergroup/channel ids with `-100`.
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// Opaque reference to a piece of media held by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    /// Platform file id usable for download.
    pub file_id: String,
}

impl MediaRef {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
        }
    }
}

/// One physical message as delivered by the event source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    /// Public `@handle` of the source channel, if it has one.
    pub channel_handle: Option<String>,
    /// Display title of the source channel.
    pub chat_title: Option<String>,
    /// Album identifier shared by every part of a multi-message post.
    pub group_id: Option<String>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media_ref: Option<MediaRef>,
}

impl InboundMessage {
    pub fn new(id: MessageId, chat_id: ChatId) -> Self {
        Self {
            id,
            chat_id,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.channel_handle = Some(handle.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.chat_title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    #[must_use]
    pub fn with_media(mut self, file_id: impl Into<String>) -> Self {
        self.media_ref = Some(MediaRef::new(file_id));
        self
    }

    /// Text body of the message: the text, else the media caption, else empty.
    pub fn body(&self) -> &str {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.caption.as_deref())
            .unwrap_or_default()
    }
}

/// A reconstructed logical post, ready for matching and delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    /// Lowest message id among the parts.
    pub primary_id: MessageId,
    pub chat_id: ChatId,
    pub channel_handle: Option<String>,
    pub channel_title: Option<String>,
    pub link: String,
    pub body_text: String,
    /// Media in ascending source message id order.
    pub media_refs: Vec<MediaRef>,
    pub is_complete: bool,
}

impl Post {
    /// Wrap a single ungrouped message.
    pub fn from_message(msg: InboundMessage) -> Self {
        let body_text = msg.body().to_string();
        let link = permalink(msg.chat_id, msg.channel_handle.as_deref(), msg.id);
        Self {
            primary_id: msg.id,
            chat_id: msg.chat_id,
            channel_handle: msg.channel_handle,
            channel_title: msg.chat_title,
            link,
            body_text,
            media_refs: msg.media_ref.into_iter().collect(),
            is_complete: true,
        }
    }

    /// Merge album parts into one post. Parts are ordered by id and
    /// duplicates (same id) collapse to one. Returns `None` for no parts.
    pub fn from_album(mut parts: Vec<InboundMessage>) -> Option<Self> {
        parts.sort_by_key(|m| m.id);
        parts.dedup_by_key(|m| m.id);
        let first = parts.first()?;

        let body_text = parts
            .iter()
            .map(InboundMessage::body)
            .find(|b| !b.is_empty())
            .unwrap_or_default()
            .to_string();
        let channel_handle = parts.iter().find_map(|m| m.channel_handle.clone());
        let channel_title = parts.iter().find_map(|m| m.chat_title.clone());
        let link = permalink(first.chat_id, channel_handle.as_deref(), first.id);

        Some(Self {
            primary_id: first.id,
            chat_id: first.chat_id,
            channel_handle,
            channel_title,
            link,
            body_text,
            media_refs: parts.into_iter().filter_map(|m| m.media_ref).collect(),
            is_complete: true,
        })
    }

    /// Title line used in delivery headers.
    pub fn display_title(&self) -> String {
        match (&self.channel_title, &self.channel_handle) {
            (Some(title), _) if !title.is_empty() => title.clone(),
            (_, Some(handle)) => handle.clone(),
            _ => self.chat_id.to_string(),
        }
    }
}

/// Build a public permalink for a channel message.
///
/// Channels without a public handle get the `t.me/c/` form, which only
/// resolves for members.
pub fn permalink(chat_id: ChatId, handle: Option<&str>, id: MessageId) -> String {
    match handle.map(|h| h.trim_start_matches('@')) {
        Some(name) if !name.is_empty() => format!("https://t.me/{name}/{id}"),
        _ => {
            let magnitude = chat_id.unsigned_abs();
            let internal = if chat_id <= -CHANNEL_ID_OFFSET {
                magnitude - CHANNEL_ID_OFFSET.unsigned_abs()
            } else {
                magnitude
            };
            format!("https://t.me/c/{internal}/{id}")
        },
    }
}

/// Normalise user input such as `jobs`, `@jobs` or `https://t.me/jobs` to
/// `@jobs`. Case is preserved because handle matching is case-sensitive.
pub fn normalize_handle(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let name = trimmed
        .strip_prefix("https://t.me/")
        .or_else(|| trimmed.strip_prefix("http://t.me/"))
        .or_else(|| trimmed.strip_prefix("t.me/"))
        .unwrap_or(trimmed)
        .trim_start_matches('@')
        .trim_end_matches('/');

    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::invalid_handle(raw));
    }
    Ok(format!("@{name}"))
}
