//! Configuration loading, validation, and env substitution.
//!
//! Config files: `postwatch.toml`, `postwatch.yaml`, `postwatch.yml` or
//! `postwatch.json`, searched in `./` then `~/.config/postwatch/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, find_config_file, load, load_config},
    schema::{MediaConfig, PipelineConfig, PostwatchConfig, SubscribersConfig, TelegramConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
