use thiserror::Error;

use postwatch_common::{ChatId, MessageId};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Channel(#[from] postwatch_channels::Error),

    /// An update that cannot become an inbound channel message.
    #[error("rejected update {id} from chat {chat_id}: {reason}")]
    Ingestion {
        chat_id: ChatId,
        id: MessageId,
        reason: &'static str,
    },

    /// Another process is polling with the same bot token.
    #[error("another instance is already polling with this bot token")]
    Conflict,

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn ingestion(chat_id: ChatId, id: MessageId, reason: &'static str) -> Self {
        Self::Ingestion {
            chat_id,
            id,
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
