#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Staging directory or file could not be created, written or read.
    #[error("media staging failed: {context}: {source}")]
    Staging {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Downloaded media had no content.
    #[error("refusing to stage empty media")]
    Empty,
}

impl Error {
    #[must_use]
    pub fn staging(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Staging {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
