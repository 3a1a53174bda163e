//! Ingestion-to-delivery pipeline.
//!
//! Inbound messages flow through the [`PostAssembler`], which rebuilds
//! albums into single [`Post`](postwatch_common::Post)s. Each emitted post is
//! matched against a registry snapshot by [`match_post`], rendered per
//! recipient by the [`DeliveryFormatter`] and sent by the [`Dispatcher`].
//! [`Pipeline`] wires the stages together behind the
//! [`InboundSink`](postwatch_channels::InboundSink) seam.

pub mod assembler;
pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod matcher;
mod recent;
pub mod service;

#[cfg(test)]
mod testing;

pub use {
    assembler::PostAssembler,
    dispatcher::{DeliveryJob, DispatchReport, Dispatcher},
    error::{Error, Result},
    formatter::{CAPTION_LIMIT, DeliveryFormatter, RenderedPayload, TEXT_LIMIT},
    matcher::match_post,
    service::Pipeline,
};
