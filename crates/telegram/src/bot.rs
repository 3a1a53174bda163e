use std::{sync::Arc, time::Duration};

use {
    postwatch_channels::InboundSink,
    postwatch_common::InboundMessage,
    postwatch_config::TelegramConfig,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, Update},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    handlers,
    history::RecentHistory,
};

/// Slack between the long-poll timeout and the HTTP client timeout, so the
/// client never aborts a request Telegram is still holding open.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(15);

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Follow-up requests made after a batch that carried album parts.
const MAX_ALBUM_DRAIN_ROUNDS: usize = 5;

/// Long-poll timeout of a follow-up request. Telegram sends album parts
/// within moments of each other.
const ALBUM_DRAIN_TIMEOUT_SECS: u32 = 1;

/// Build a bot client, verify the token and clear any webhook so long
/// polling works.
pub async fn connect(config: &TelegramConfig) -> Result<Bot> {
    let token = config.token.expose_secret();
    if token.trim().is_empty() {
        return Err(Error::message("telegram bot token is not configured"));
    }
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs)) + CLIENT_TIMEOUT_SLACK)
        .build()?;
    let bot = Bot::with_client(token, client);

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;
    info!(username = ?me.username, "telegram bot connected (webhook cleared)");
    Ok(bot)
}

/// Long-polls `getUpdates` for channel posts.
pub struct Poller {
    bot: Bot,
    history: Arc<RecentHistory>,
    allowlist: Vec<String>,
    timeout_secs: u32,
}

impl Poller {
    pub fn new(bot: Bot, history: Arc<RecentHistory>, config: &TelegramConfig) -> Self {
        Self {
            bot,
            history,
            allowlist: config.channel_allowlist.clone(),
            timeout_secs: config.poll_timeout_secs,
        }
    }

    /// Poll until `cancel` fires. Each batch is recorded in the recent
    /// history first, then pushed into `sink` one message at a time in
    /// delivery order. A batch carrying album parts is extended with the
    /// updates still pending, so parts split across responses are recorded
    /// before the first of them is ingested.
    ///
    /// Returns [`Error::Conflict`] when another process polls the same token;
    /// other request failures are logged and retried after a pause.
    pub async fn run(&self, sink: &dyn InboundSink, cancel: CancellationToken) -> Result<()> {
        info!("starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.fetch(offset, self.timeout_secs) => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    let mut batch = handlers::collect_batch(updates, &mut offset, &self.allowlist);
                    self.drain_album_parts(&mut batch, &mut offset).await;
                    self.history.record(&batch);
                    for msg in batch {
                        sink.ingest(msg).await;
                    }
                },
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    warn!("telegram polling stopped: another instance is running with this token");
                    return Err(Error::Conflict);
                },
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(ERROR_BACKOFF) => {},
                    }
                },
            }
        }

        info!("telegram polling stopped");
        Ok(())
    }

    async fn fetch(&self, offset: i32, timeout_secs: u32) -> std::result::Result<Vec<Update>, RequestError> {
        self.bot
            .get_updates()
            .offset(offset)
            .timeout(timeout_secs)
            .allowed_updates([AllowedUpdate::ChannelPost])
            .send()
            .await
    }

    /// Keep fetching while the latest response carried album parts. Stops on
    /// an empty response, a request error or after [`MAX_ALBUM_DRAIN_ROUNDS`];
    /// errors are left for the main loop to see on its next request.
    async fn drain_album_parts(&self, batch: &mut Vec<InboundMessage>, offset: &mut i32) {
        let mut pending = has_album_part(batch);
        let mut rounds = 0;
        while pending && rounds < MAX_ALBUM_DRAIN_ROUNDS {
            rounds += 1;
            let updates = match self.fetch(*offset, ALBUM_DRAIN_TIMEOUT_SECS).await {
                Ok(updates) if updates.is_empty() => break,
                Ok(updates) => updates,
                Err(e) => {
                    debug!(error = %e, "album drain request failed");
                    break;
                },
            };
            let more = handlers::collect_batch(updates, offset, &self.allowlist);
            debug!(count = more.len(), round = rounds, "drained pending updates");
            pending = has_album_part(&more);
            batch.extend(more);
        }
    }
}

fn has_album_part(batch: &[InboundMessage]) -> bool {
    batch.iter().any(|m| m.group_id.is_some())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use {
        async_trait::async_trait,
        axum::{Json, Router, extract::State, http::Uri, routing::post},
        postwatch_channels::MessageHistory,
        postwatch_common::MessageId,
        serde_json::{Value, json},
    };

    use super::*;

    /// Answers `getUpdates` call `n` with `script[n]`, then with no updates.
    #[derive(Clone)]
    struct MockUpdates {
        calls: Arc<AtomicUsize>,
        conflict: bool,
        script: Arc<Vec<Value>>,
    }

    impl MockUpdates {
        fn scripted(script: Vec<Value>) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                conflict: false,
                script: Arc::new(script),
            }
        }

        fn conflicting() -> Self {
            Self {
                conflict: true,
                ..Self::scripted(Vec::new())
            }
        }
    }

    fn channel_post(update_id: i64, message_id: i64, username: &str) -> Value {
        json!({
            "update_id": update_id,
            "channel_post": {
                "message_id": message_id,
                "date": 1,
                "chat": { "id": -1001, "type": "channel", "title": "Jobs", "username": username },
                "text": format!("post {message_id}")
            }
        })
    }

    fn album_part(update_id: i64, message_id: i64, caption: Option<&str>) -> Value {
        let mut post = json!({
            "message_id": message_id,
            "date": 1,
            "chat": { "id": -1001, "type": "channel", "title": "Jobs", "username": "jobs" },
            "media_group_id": "g1",
            "photo": [{
                "file_id": format!("f{message_id}"),
                "file_unique_id": format!("u{message_id}"),
                "width": 90,
                "height": 90,
                "file_size": 100
            }]
        });
        if let Some(caption) = caption {
            post["caption"] = json!(caption);
        }
        json!({ "update_id": update_id, "channel_post": post })
    }

    async fn updates_handler(State(state): State<MockUpdates>, uri: Uri) -> Json<Value> {
        assert!(uri.path().ends_with("GetUpdates"));
        let call = state.calls.fetch_add(1, Ordering::SeqCst);
        if state.conflict {
            return Json(json!({
                "ok": false,
                "error_code": 409,
                "description": "Conflict: terminated by other getUpdates request; make sure that only one bot instance is running"
            }));
        }
        let result = state.script.get(call).cloned().unwrap_or_else(|| json!([]));
        Json(json!({ "ok": true, "result": result }))
    }

    async fn mock_bot(state: MockUpdates) -> Bot {
        let app = Router::new()
            .route("/{*path}", post(updates_handler))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Bot::new("test-token").set_api_url(reqwest::Url::parse(&format!("http://{addr}/")).unwrap())
    }

    /// Records what it is fed and cancels polling after `stop_after` messages.
    struct StopAfter {
        seen: Mutex<Vec<InboundMessage>>,
        stop_after: usize,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl InboundSink for StopAfter {
        async fn ingest(&self, msg: InboundMessage) {
            let mut seen = self.seen.lock().unwrap();
            seen.push(msg);
            if seen.len() >= self.stop_after {
                self.cancel.cancel();
            }
        }
    }

    fn config(allowlist: &[&str]) -> TelegramConfig {
        TelegramConfig {
            poll_timeout_secs: 0,
            channel_allowlist: allowlist.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn polls_records_history_and_feeds_sink_in_order() {
        let state = MockUpdates::scripted(vec![
            json!([channel_post(1, 10, "jobs"), channel_post(2, 11, "spam")]),
            json!([channel_post(3, 12, "jobs")]),
        ]);
        let bot = mock_bot(state.clone()).await;
        let history = Arc::new(RecentHistory::new(16));
        let poller = Poller::new(bot, Arc::clone(&history), &config(&["@jobs"]));
        let cancel = CancellationToken::new();
        let sink = StopAfter {
            seen: Mutex::new(Vec::new()),
            stop_after: 2,
            cancel: cancel.clone(),
        };

        poller.run(&sink, cancel).await.unwrap();

        let ids: Vec<_> = sink.seen.lock().unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, [10, 12]);
        let recorded = history.get_messages(-1001, 1, 100, 10).await.unwrap();
        assert_eq!(recorded.len(), 2);
        assert!(state.calls.load(Ordering::SeqCst) >= 2);
    }

    /// Notes how many posts of the chat were recorded when each message
    /// was ingested.
    struct HistoryAtIngest {
        history: Arc<RecentHistory>,
        seen: Mutex<Vec<(MessageId, usize)>>,
        stop_after: usize,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl InboundSink for HistoryAtIngest {
        async fn ingest(&self, msg: InboundMessage) {
            let mut seen = self.seen.lock().unwrap();
            seen.push((msg.id, self.history.len(msg.chat_id)));
            if seen.len() >= self.stop_after {
                self.cancel.cancel();
            }
        }
    }

    #[tokio::test]
    async fn album_split_across_responses_is_recorded_before_ingest() {
        let state = MockUpdates::scripted(vec![
            json!([album_part(1, 100, None)]),
            json!([album_part(2, 101, None), album_part(3, 102, Some("data analyst role"))]),
        ]);
        let bot = mock_bot(state.clone()).await;
        let history = Arc::new(RecentHistory::new(16));
        let poller = Poller::new(bot, Arc::clone(&history), &config(&[]));
        let cancel = CancellationToken::new();
        let sink = HistoryAtIngest {
            history: Arc::clone(&history),
            seen: Mutex::new(Vec::new()),
            stop_after: 3,
            cancel: cancel.clone(),
        };

        poller.run(&sink, cancel).await.unwrap();

        assert_eq!(*sink.seen.lock().unwrap(), [(100, 3), (101, 3), (102, 3)]);
        let parts = history.get_messages(-1001, 90, 110, 10).await.unwrap();
        assert!(parts.iter().all(|m| m.group_id.as_deref() == Some("g1")));
        // First response, one drain hit, one empty drain answer.
        assert_eq!(state.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn plain_posts_are_not_drained() {
        let state = MockUpdates::scripted(vec![json!([channel_post(1, 10, "jobs")])]);
        let bot = mock_bot(state.clone()).await;
        let poller = Poller::new(bot, Arc::new(RecentHistory::new(4)), &config(&[]));
        let cancel = CancellationToken::new();
        let sink = StopAfter {
            seen: Mutex::new(Vec::new()),
            stop_after: 1,
            cancel: cancel.clone(),
        };

        poller.run(&sink, cancel).await.unwrap();

        assert_eq!(state.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn conflict_stops_polling() {
        let state = MockUpdates::conflicting();
        let bot = mock_bot(state.clone()).await;
        let poller = Poller::new(bot, Arc::new(RecentHistory::new(4)), &config(&[]));
        let cancel = CancellationToken::new();
        let sink = StopAfter {
            seen: Mutex::new(Vec::new()),
            stop_after: 1,
            cancel: cancel.clone(),
        };

        let result = poller.run(&sink, cancel).await;
        assert!(matches!(result, Err(Error::Conflict)));
        assert_eq!(state.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_immediately() {
        let bot = mock_bot(MockUpdates::scripted(Vec::new())).await;
        let poller = Poller::new(bot, Arc::new(RecentHistory::new(4)), &config(&[]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sink = StopAfter {
            seen: Mutex::new(Vec::new()),
            stop_after: 1,
            cancel: cancel.clone(),
        };
        poller.run(&sink, cancel).await.unwrap();
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_rejects_empty_token() {
        assert!(matches!(
            connect(&TelegramConfig::default()).await,
            Err(Error::Message { .. })
        ));
    }
}
