//! Subscriber preferences: per-subscriber channel and keyword filters, the
//! onboarding state machine, and the registries that hold them.

pub mod config;
pub mod error;
pub mod registry;
pub mod store;

pub use {
    config::{OnboardingState, SubscriberConfig, parse_list},
    error::{Error, Result},
    registry::{MemoryRegistry, Snapshot, SubscriberRegistry},
    store::JsonFileRegistry,
};
