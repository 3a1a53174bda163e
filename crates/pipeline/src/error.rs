use std::error::Error as StdError;

use postwatch_common::{ChatId, MessageId};

/// Failures inside the pipeline. Every variant is contained at the scope of
/// one message, one post, or one (post, subscriber) delivery.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Inbound event is malformed; it is skipped.
    #[error("malformed inbound message {id} in chat {chat_id}: {reason}")]
    Ingestion {
        chat_id: ChatId,
        id: MessageId,
        reason: String,
    },

    /// Sibling lookup for an album failed; the post degrades to its trigger.
    #[error("album gather for group {group_id} in chat {chat_id} failed: {source}")]
    Assembly {
        chat_id: ChatId,
        group_id: String,
        #[source]
        source: postwatch_channels::Error,
    },

    /// Media could not be fetched or staged for one recipient.
    #[error("render failed: {context}: {source}")]
    Render {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The send primitive rejected one delivery.
    #[error("delivery failed: {0}")]
    Delivery(#[from] postwatch_channels::Error),
}

impl Error {
    #[must_use]
    pub fn ingestion(chat_id: ChatId, id: MessageId, reason: impl Into<String>) -> Self {
        Self::Ingestion {
            chat_id,
            id,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn render(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Render {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl From<postwatch_media::Error> for Error {
    fn from(source: postwatch_media::Error) -> Self {
        Self::render("stage media", source)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
