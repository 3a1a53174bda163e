//! Shared types, error definitions, and utilities used across all postwatch crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{
        ChatId, InboundMessage, MediaRef, MessageId, Post, SubscriberId, normalize_handle, permalink,
    },
};
