//! Conversion of Telegram updates into inbound channel messages.

use {
    postwatch_channels::gating::is_channel_allowed,
    postwatch_common::InboundMessage,
    teloxide::types::{Message, MessageKind, Update, UpdateKind},
    tracing::{debug, warn},
};

use crate::error::{Error, Result};

/// Convert a channel post. Messages from other chat kinds and service
/// messages (pins, title changes, ...) are rejected.
pub fn to_inbound(msg: &Message) -> Result<InboundMessage> {
    let chat_id = msg.chat.id.0;
    let id = msg.id.0;
    if !msg.chat.is_channel() {
        return Err(Error::ingestion(chat_id, id, "not a channel"));
    }
    if !matches!(msg.kind, MessageKind::Common(_)) {
        return Err(Error::ingestion(chat_id, id, "service message"));
    }

    let mut inbound = InboundMessage::new(id, chat_id);
    inbound.channel_handle = msg.chat.username().map(|name| format!("@{name}"));
    inbound.chat_title = msg.chat.title().map(str::to_string);
    inbound.group_id = msg.media_group_id().map(|g| g.to_string());
    inbound.text = msg.text().map(str::to_string);
    inbound.caption = msg.caption().map(str::to_string);
    if let Some(file_id) = largest_photo(msg) {
        inbound = inbound.with_media(file_id);
    }
    Ok(inbound)
}

/// File id of the largest size of a photo message.
fn largest_photo(msg: &Message) -> Option<String> {
    msg.photo()
        .and_then(|sizes| sizes.last())
        .map(|size| size.file.id.clone())
}

/// Turn one `getUpdates` response into the batch to ingest, advancing
/// `offset` past every update seen. Rejected and disallowed posts are
/// skipped.
pub fn collect_batch(
    updates: Vec<Update>,
    offset: &mut i32,
    allowlist: &[String],
) -> Vec<InboundMessage> {
    let mut batch = Vec::with_capacity(updates.len());
    for update in updates {
        *offset = update.id.as_offset();
        let UpdateKind::ChannelPost(msg) = update.kind else {
            debug!("ignoring non channel-post update");
            continue;
        };
        let inbound = match to_inbound(&msg) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "skipping telegram update");
                continue;
            },
        };
        if !is_channel_allowed(inbound.channel_handle.as_deref(), inbound.chat_id, allowlist) {
            debug!(
                chat_id = inbound.chat_id,
                handle = ?inbound.channel_handle,
                "channel not in allowlist"
            );
            continue;
        }
        batch.push(inbound);
    }
    batch
}
