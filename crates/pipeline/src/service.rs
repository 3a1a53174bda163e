use std::{collections::BTreeSet, sync::Arc};

use {
    async_trait::async_trait,
    postwatch_channels::InboundSink,
    postwatch_common::{InboundMessage, Post},
    postwatch_subscribers::SubscriberRegistry,
    tokio_util::task::TaskTracker,
    tracing::{debug, info, warn},
};

use crate::{
    assembler::PostAssembler,
    dispatcher::{DispatchReport, Dispatcher},
    error::{Error, Result},
    matcher::match_post,
};

/// The full ingest → assemble → match → dispatch chain.
///
/// Assembly runs inline with [`InboundSink::ingest`] so messages are
/// assembled in arrival order. Matching and fan-out of each emitted post run
/// as tracked background tasks; [`Pipeline::shutdown`] waits for them.
pub struct Pipeline {
    assembler: PostAssembler,
    registry: Arc<dyn SubscriberRegistry>,
    dispatcher: Arc<Dispatcher>,
    tasks: TaskTracker,
}

impl Pipeline {
    pub fn new(
        assembler: PostAssembler,
        registry: Arc<dyn SubscriberRegistry>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            assembler,
            registry,
            dispatcher,
            tasks: TaskTracker::new(),
        }
    }

    /// Validate and assemble one message. `Ok(None)` while the message is
    /// absorbed into another post.
    pub async fn accept(&self, msg: InboundMessage) -> Result<Option<Post>> {
        validate(&msg)?;
        Ok(self.assembler.ingest(msg).await)
    }

    /// Match `post` against a fresh registry snapshot and deliver it.
    pub async fn deliver(&self, post: Post) -> DispatchReport {
        match_and_dispatch(self.registry.as_ref(), &self.dispatcher, post).await
    }

    /// Accept, then deliver inline. Used where the caller needs the outcome.
    pub async fn process(&self, msg: InboundMessage) -> Result<Option<DispatchReport>> {
        match self.accept(msg).await? {
            Some(post) => Ok(Some(self.deliver(post).await)),
            None => Ok(None),
        }
    }

    /// Stop accepting background deliveries and wait for running ones.
    pub async fn shutdown(&self) {
        self.tasks.close();
        if !self.tasks.is_empty() {
            info!(pending = self.tasks.len(), "waiting for in-flight deliveries");
        }
        self.tasks.wait().await;
    }
}

#[async_trait]
impl InboundSink for Pipeline {
    async fn ingest(&self, msg: InboundMessage) {
        let (chat_id, msg_id) = (msg.chat_id, msg.id);
        let post = match self.accept(msg).await {
            Ok(Some(post)) => post,
            Ok(None) => return,
            Err(e) => {
                warn!(chat_id, msg_id, error = %e, "skipping inbound message");
                return;
            },
        };

        let registry = Arc::clone(&self.registry);
        let dispatcher = Arc::clone(&self.dispatcher);
        self.tasks.spawn(async move {
            match_and_dispatch(registry.as_ref(), &dispatcher, post).await;
        });
    }
}

async fn match_and_dispatch(
    registry: &dyn SubscriberRegistry,
    dispatcher: &Dispatcher,
    post: Post,
) -> DispatchReport {
    let snapshot = registry.get_all().await;
    let recipients: BTreeSet<_> = match_post(&post, &snapshot);
    if recipients.is_empty() {
        debug!(chat_id = post.chat_id, post_id = post.primary_id, "no subscriber matched");
        return DispatchReport::default();
    }

    info!(
        chat_id = post.chat_id,
        post_id = post.primary_id,
        recipients = recipients.len(),
        "dispatching post"
    );
    let report = dispatcher.dispatch(Arc::new(post), recipients).await;
    if !report.failed.is_empty() || report.panicked > 0 {
        warn!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            panicked = report.panicked,
            "post partially delivered"
        );
    }
    report
}

fn validate(msg: &InboundMessage) -> Result<()> {
    if msg.id <= 0 {
        return Err(Error::ingestion(msg.chat_id, msg.id, "message id must be positive"));
    }
    if msg.chat_id == 0 {
        return Err(Error::ingestion(msg.chat_id, msg.id, "missing chat id"));
    }
    if msg.group_id.as_deref().is_some_and(str::is_empty) {
        return Err(Error::ingestion(msg.chat_id, msg.id, "empty album group id"));
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        postwatch_config::PipelineConfig,
        postwatch_media::StagingArea,
        postwatch_subscribers::{MemoryRegistry, SubscriberConfig},
        rstest::rstest,
    };

    use super::*;
    use crate::{
        formatter::DeliveryFormatter,
        testing::{FakeFetcher, RecordingOutbound, ScriptedHistory, Sent, jobs_album},
    };

    struct Harness {
        pipeline: Pipeline,
        outbound: Arc<RecordingOutbound>,
        _root: tempfile::TempDir,
    }

    fn harness(
        history: Vec<InboundMessage>,
        subscribers: Vec<SubscriberConfig>,
        outbound: RecordingOutbound,
    ) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let outbound = Arc::new(outbound);
        let config = PipelineConfig::default();
        let formatter = DeliveryFormatter::new(
            Arc::new(FakeFetcher::default()),
            StagingArea::new(Some(root.path().to_path_buf())),
        );
        let pipeline = Pipeline::new(
            PostAssembler::new(Arc::new(ScriptedHistory::new(history)), &config),
            Arc::new(MemoryRegistry::new(subscribers)),
            Arc::new(Dispatcher::new(
                Arc::new(formatter),
                outbound.clone(),
                config.fanout_limit,
            )),
        );
        Harness {
            pipeline,
            outbound,
            _root: root,
        }
    }

    #[tokio::test]
    async fn album_scenario_delivers_one_photo_group() {
        let h = harness(
            jobs_album(),
            vec![SubscriberConfig::active(42, ["@jobs"], ["data analyst"])],
            RecordingOutbound::default(),
        );

        let mut reports = Vec::new();
        for part in jobs_album() {
            reports.extend(h.pipeline.process(part).await.unwrap());
        }

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].delivered, BTreeSet::from([42]));
        let sent = h.outbound.sent_to(42);
        let [Sent::Group { file_names, captions }] = sent.as_slice() else {
            panic!("expected one photo group, got {sent:?}");
        };
        assert_eq!(file_names.len(), 3);
        assert_eq!(
            captions[0].as_deref(),
            Some("@jobs\nhttps://t.me/jobs/100\n\ndata analyst role")
        );
    }

    #[tokio::test]
    async fn empty_post_reaches_nobody() {
        let h = harness(
            Vec::new(),
            vec![SubscriberConfig::active(1, ["@jobs"], ["a", "e"])],
            RecordingOutbound::default(),
        );
        let report = h
            .pipeline
            .process(InboundMessage::new(200, -1001).with_handle("@jobs").with_text(""))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report, DispatchReport::default());
        assert_eq!(h.outbound.total(), 0);
    }

    #[tokio::test]
    async fn one_failing_subscriber_does_not_block_others() {
        let h = harness(
            Vec::new(),
            vec![
                SubscriberConfig::active(1, ["@jobs"], ["rust"]),
                SubscriberConfig::active(2, ["@jobs"], ["rust"]),
                SubscriberConfig::active(3, ["@jobs"], ["rust"]),
            ],
            RecordingOutbound::failing_for([1]),
        );
        let report = h
            .pipeline
            .process(InboundMessage::new(9, -1001).with_handle("@jobs").with_text("Rust dev"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.failed, BTreeSet::from([1]));
        assert_eq!(report.delivered, BTreeSet::from([2, 3]));
    }

    #[rstest]
    #[case(InboundMessage::new(0, -1001))]
    #[case(InboundMessage::new(-4, -1001))]
    #[case(InboundMessage::new(5, 0))]
    #[case(InboundMessage::new(5, -1001).with_group(""))]
    #[tokio::test]
    async fn malformed_messages_are_rejected(#[case] msg: InboundMessage) {
        let h = harness(Vec::new(), Vec::new(), RecordingOutbound::default());
        assert!(matches!(
            h.pipeline.accept(msg).await,
            Err(Error::Ingestion { .. })
        ));
    }

    #[tokio::test]
    async fn sink_delivers_in_background_and_shutdown_drains() {
        let h = harness(
            jobs_album(),
            vec![SubscriberConfig::active(42, ["@jobs"], ["analyst"])],
            RecordingOutbound::default(),
        );

        for part in jobs_album() {
            h.pipeline.ingest(part).await;
        }
        h.pipeline.ingest(InboundMessage::new(0, -1001)).await;
        h.pipeline.shutdown().await;

        assert_eq!(h.outbound.sent_to(42).len(), 1);
        assert_eq!(h.outbound.total(), 1);
    }
}
