use crate::config::OnboardingState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// The requested onboarding step is not valid from the current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: OnboardingState,
        action: &'static str,
    },

    #[error(transparent)]
    Common(#[from] postwatch_common::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl postwatch_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

postwatch_common::impl_context!();
