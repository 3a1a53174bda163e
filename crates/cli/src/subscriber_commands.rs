use std::{io::Write, path::Path};

use {
    anyhow::{Context, Result},
    clap::Subcommand,
    postwatch_subscribers::{JsonFileRegistry, OnboardingState, SubscriberConfig, parse_list},
    tracing::info,
};

#[derive(Subcommand)]
pub enum SubscriberAction {
    /// List subscribers (default).
    List,
    /// Create a subscriber or replace its filters, and activate delivery.
    Add {
        /// Telegram chat id that receives deliveries.
        #[arg(allow_negative_numbers = true)]
        id: i64,
        /// Channel handles or t.me links, comma separated or repeated.
        #[arg(long, required = true)]
        channels: Vec<String>,
        /// Keywords, comma separated or repeated.
        #[arg(long, required = true)]
        keywords: Vec<String>,
    },
    /// Stop delivery to a subscriber, keeping its filters.
    Pause {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
    /// Re-enable delivery to a paused subscriber.
    Resume {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
}

pub fn handle_subscribers(config_path: Option<&Path>, action: SubscriberAction) -> Result<()> {
    let (config, _) = postwatch_config::load(config_path)?;
    let registry = JsonFileRegistry::open(&config.subscribers.path).with_context(|| {
        format!(
            "failed to open subscriber registry {}",
            config.subscribers.path.display()
        )
    })?;

    let changed = match action {
        SubscriberAction::List => {
            let mut stdout = std::io::stdout().lock();
            print_table(&registry.list(), &mut stdout)?;
            return Ok(());
        },
        SubscriberAction::Add {
            id,
            channels,
            keywords,
        } => add(&registry, id, &channels, &keywords)?,
        SubscriberAction::Pause { id } => set_paused(&registry, id, true)?,
        SubscriberAction::Resume { id } => set_paused(&registry, id, false)?,
    };
    let mut stdout = std::io::stdout().lock();
    print_table(std::slice::from_ref(&changed), &mut stdout)?;
    Ok(())
}

/// Run the onboarding transitions for `id` with the given filters.
fn add(
    registry: &JsonFileRegistry,
    id: i64,
    channels: &[String],
    keywords: &[String],
) -> Result<SubscriberConfig> {
    let mut subscriber = registry.get_or_create(id)?;
    if matches!(
        subscriber.state,
        OnboardingState::AwaitingChannels | OnboardingState::AwaitingKeywords
    ) {
        // Abandon a half-finished onboarding.
        subscriber.pause();
    }
    subscriber.begin()?;
    subscriber.submit_channels(channels.iter().flat_map(|c| parse_list(c)))?;
    subscriber.submit_keywords(keywords.iter().flat_map(|k| parse_list(k)))?;
    registry.update(subscriber.clone())?;
    info!(subscriber_id = id, "subscriber activated");
    Ok(subscriber)
}

fn set_paused(registry: &JsonFileRegistry, id: i64, paused: bool) -> Result<SubscriberConfig> {
    let mut subscriber = registry
        .get(id)
        .with_context(|| format!("no subscriber with id {id}"))?;
    if paused {
        subscriber.pause();
    } else {
        subscriber.resume()?;
    }
    registry.update(subscriber.clone())?;
    info!(subscriber_id = id, active = subscriber.active, "subscriber updated");
    Ok(subscriber)
}

fn print_table(subscribers: &[SubscriberConfig], out: &mut impl Write) -> std::io::Result<()> {
    if subscribers.is_empty() {
        return writeln!(out, "No subscribers.");
    }
    for s in subscribers {
        let status = if s.active { "active" } else { "paused" };
        writeln!(out, "{} [{status}, {}]", s.subscriber_id, s.state)?;
        writeln!(out, "  channels: {}", join(&s.channels))?;
        writeln!(out, "  keywords: {}", join(&s.keywords))?;
    }
    Ok(())
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let joined = items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() { "-".into() } else { joined }
}
