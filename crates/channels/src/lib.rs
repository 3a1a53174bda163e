//! Platform seams for postwatch.
//!
//! A messaging platform plugs into the pipeline through the traits in
//! [`plugin`]: a recent-history range query for album gathering, an inbound
//! sink the platform pushes messages into, a media fetcher and an outbound
//! send primitive. Everything else in the workspace depends on these traits,
//! never on a concrete platform client.

pub mod error;
pub mod gating;
pub mod plugin;

pub use {
    error::{Error, Result},
    plugin::{ChannelOutbound, GroupItem, InboundSink, MediaFetcher, MessageHistory, PhotoUpload},
};
