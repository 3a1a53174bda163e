use std::sync::Arc;

use {
    postwatch_channels::InboundSink,
    postwatch_config::TelegramConfig,
    teloxide::Bot,
    tokio_util::sync::CancellationToken,
    tracing::info,
};

use crate::{
    bot::{self, Poller},
    error::Result,
    history::RecentHistory,
    outbound::TelegramOutbound,
};

/// One connected bot account: the poller feeding posts in, the recent
/// history it records, and the outbound used for delivery and downloads.
pub struct TelegramChannel {
    poller: Poller,
    history: Arc<RecentHistory>,
    outbound: Arc<TelegramOutbound>,
}

impl TelegramChannel {
    /// Verify the token against the Bot API and prepare polling.
    pub async fn connect(config: &TelegramConfig) -> Result<Self> {
        let bot = bot::connect(config).await?;
        Ok(Self::from_bot(bot, config))
    }

    /// Wrap an already constructed client without contacting the API.
    pub fn from_bot(bot: Bot, config: &TelegramConfig) -> Self {
        let history = Arc::new(RecentHistory::new(config.history_per_chat));
        info!(
            allowlist = config.channel_allowlist.len(),
            history_per_chat = config.history_per_chat,
            "telegram channel ready"
        );
        Self {
            poller: Poller::new(bot.clone(), Arc::clone(&history), config),
            history,
            outbound: Arc::new(TelegramOutbound::new(bot)),
        }
    }

    /// Send primitive and media downloader for this account.
    pub fn outbound(&self) -> Arc<TelegramOutbound> {
        Arc::clone(&self.outbound)
    }

    /// Range-queryable store of recently polled posts.
    pub fn history(&self) -> Arc<RecentHistory> {
        Arc::clone(&self.history)
    }

    /// Poll until `cancel` fires, pushing every admitted post into `sink`.
    pub async fn run(&self, sink: &dyn InboundSink, cancel: CancellationToken) -> Result<()> {
        self.poller.run(sink, cancel).await
    }
}
