use std::{collections::BTreeSet, fmt};

use {
    postwatch_common::{SubscriberId, normalize_handle},
    serde::{Deserialize, Serialize},
};

use crate::error::{Error, Result};

/// Where a subscriber is in the onboarding conversation.
///
/// `Idle → AwaitingChannels → AwaitingKeywords → Active`, with `pause`
/// returning to `Idle` and `begin` restarting from either end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingState {
    #[default]
    Idle,
    AwaitingChannels,
    AwaitingKeywords,
    Active,
}

impl fmt::Display for OnboardingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingChannels => "awaiting channels",
            Self::AwaitingKeywords => "awaiting keywords",
            Self::Active => "active",
        };
        f.write_str(s)
    }
}

/// Filters of one subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Stored as the map key on disk.
    #[serde(skip)]
    pub subscriber_id: SubscriberId,
    /// `@`-prefixed channel handles, matched case-sensitively.
    #[serde(default)]
    pub channels: BTreeSet<String>,
    /// Keywords, matched case-insensitively as substrings.
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub state: OnboardingState,
}

impl SubscriberConfig {
    /// A fresh, inactive subscriber with no filters.
    pub fn new(subscriber_id: SubscriberId) -> Self {
        Self {
            subscriber_id,
            ..Default::default()
        }
    }

    /// Builder used by tests and seeding: an active subscriber with filters.
    pub fn active<C, K>(subscriber_id: SubscriberId, channels: C, keywords: K) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        Self {
            subscriber_id,
            channels: channels.into_iter().map(Into::into).collect(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            active: true,
            state: OnboardingState::Active,
        }
    }

    /// Start (or restart) onboarding. Delivery stops until keywords are
    /// submitted again.
    pub fn begin(&mut self) -> Result<()> {
        match self.state {
            OnboardingState::Idle | OnboardingState::Active => {
                self.state = OnboardingState::AwaitingChannels;
                self.active = false;
                Ok(())
            },
            state => Err(Error::InvalidTransition {
                state,
                action: "begin onboarding",
            }),
        }
    }

    /// Replace the channel set. Handles are normalised to `@name`.
    pub fn submit_channels<I, S>(&mut self, raw: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.state != OnboardingState::AwaitingChannels {
            return Err(Error::InvalidTransition {
                state: self.state,
                action: "submit channels",
            });
        }
        let channels = raw
            .into_iter()
            .map(|h| normalize_handle(h.as_ref()))
            .collect::<postwatch_common::Result<BTreeSet<_>>>()?;
        if channels.is_empty() {
            return Err(Error::message("at least one channel is required"));
        }
        self.channels = channels;
        self.state = OnboardingState::AwaitingKeywords;
        Ok(())
    }

    /// Replace the keyword set and activate delivery.
    pub fn submit_keywords<I, S>(&mut self, raw: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.state != OnboardingState::AwaitingKeywords {
            return Err(Error::InvalidTransition {
                state: self.state,
                action: "submit keywords",
            });
        }
        let keywords: BTreeSet<String> = raw
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Err(Error::message("at least one keyword is required"));
        }
        self.keywords = keywords;
        self.state = OnboardingState::Active;
        self.active = true;
        Ok(())
    }

    /// Stop delivery, keeping the filters.
    pub fn pause(&mut self) {
        self.active = false;
        self.state = OnboardingState::Idle;
    }

    /// Re-enable delivery for a paused subscriber whose filters are complete.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != OnboardingState::Idle {
            return Err(Error::InvalidTransition {
                state: self.state,
                action: "resume",
            });
        }
        if self.channels.is_empty() || self.keywords.is_empty() {
            return Err(Error::message(
                "channels and keywords must be set before resuming",
            ));
        }
        self.active = true;
        self.state = OnboardingState::Active;
        Ok(())
    }
}

/// Split free-form user input on commas and newlines.
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
