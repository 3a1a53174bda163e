//! Telegram adapter for postwatch.
//!
//! Long-polls the Bot API for channel posts, keeps a bounded per-channel
//! history for album lookups, and sends deliveries to subscriber chats.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod history;
pub mod outbound;
pub mod plugin;

pub use {
    error::{Error, Result},
    history::RecentHistory,
    outbound::TelegramOutbound,
    plugin::TelegramChannel,
};
