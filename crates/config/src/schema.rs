use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostwatchConfig {
    pub telegram: TelegramConfig,
    pub pipeline: PipelineConfig,
    pub subscribers: SubscribersConfig,
    pub media: MediaConfig,
}

/// Telegram bot account used both to watch channels and to deliver posts.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Long-polling timeout passed to `getUpdates` (seconds).
    pub poll_timeout_secs: u32,

    /// Channels whose posts are ingested. Empty admits every channel the bot
    /// is a member of. Supports `*` globs, e.g. `@remote_*`.
    pub channel_allowlist: Vec<String>,

    /// Recent messages kept per channel for album sibling lookups.
    pub history_per_chat: usize,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("channel_allowlist", &self.channel_allowlist)
            .field("history_per_chat", &self.history_per_chat)
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            poll_timeout_secs: 30,
            channel_allowlist: Vec::new(),
            history_per_chat: 256,
        }
    }
}

/// Album assembly and fan-out tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ids scanned on each side of an album trigger message.
    pub album_scan_window: i32,
    /// Maximum messages returned by one sibling scan.
    pub album_scan_limit: usize,
    /// Completed albums (and single posts) remembered to drop late parts and
    /// redeliveries.
    pub album_memory: usize,
    /// Concurrent deliveries per post.
    pub fanout_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            album_scan_window: 10,
            album_scan_limit: 50,
            album_memory: 1024,
            fanout_limit: 8,
        }
    }
}

/// Subscriber preference storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribersConfig {
    /// JSON file holding subscriber filters.
    pub path: PathBuf,
}

impl Default for SubscribersConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("user_settings.json"),
        }
    }
}

/// Media staging for re-upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Parent directory for per-delivery staging dirs. System temp dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}
