//! Media staging for re-upload: scoped temp storage for downloaded media and
//! image format sniffing.

pub mod error;
pub mod image_ops;
pub mod staging;

pub use {
    error::{Error, Result},
    staging::{StagedFile, StagedMedia, StagingArea},
};
