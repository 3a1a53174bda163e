//! Bounded, failure-isolated fan-out of one post to its recipients.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use {
    postwatch_channels::{ChannelOutbound, GroupItem, PhotoUpload},
    postwatch_common::{Post, SubscriberId},
    postwatch_media::StagedFile,
    tokio::{sync::Semaphore, task::JoinSet},
    tracing::{error, info, warn},
};

use crate::{
    error::Result,
    formatter::{DeliveryFormatter, RenderedPayload},
};

/// One rendered payload bound for one subscriber. Sent at most once.
#[derive(Debug)]
pub struct DeliveryJob {
    pub subscriber_id: SubscriberId,
    pub payload: RenderedPayload,
}

impl DeliveryJob {
    /// Send the payload. Consumes the job so staged media is released when
    /// the send returns, whatever the outcome.
    pub async fn send(self, outbound: &dyn ChannelOutbound) -> Result<()> {
        let to = self.subscriber_id;
        match self.payload {
            RenderedPayload::Text(text) => outbound.send_text(to, &text).await?,
            RenderedPayload::SinglePhoto { photo, caption } => {
                let mut uploads = uploads(photo.files()).await?;
                let Some(upload) = uploads.pop() else {
                    return Err(postwatch_media::Error::Empty.into());
                };
                outbound.send_photo(to, upload, &caption).await?;
            },
            RenderedPayload::PhotoGroup { photos, captions } => {
                let items = uploads(photos.files())
                    .await?
                    .into_iter()
                    .zip(captions)
                    .map(|(photo, caption)| GroupItem { photo, caption })
                    .collect();
                outbound.send_photo_group(to, items).await?;
            },
        }
        Ok(())
    }
}

async fn uploads(files: &[StagedFile]) -> Result<Vec<PhotoUpload>> {
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        out.push(PhotoUpload {
            bytes: file.read().await?,
            file_name: file.file_name().to_string(),
        });
    }
    Ok(out)
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: BTreeSet<SubscriberId>,
    pub failed: BTreeSet<SubscriberId>,
    /// Delivery tasks that panicked. Their recipients are also in `failed`.
    pub panicked: usize,
}

pub struct Dispatcher {
    formatter: Arc<DeliveryFormatter>,
    outbound: Arc<dyn ChannelOutbound>,
    fanout_limit: usize,
}

impl Dispatcher {
    pub fn new(
        formatter: Arc<DeliveryFormatter>,
        outbound: Arc<dyn ChannelOutbound>,
        fanout_limit: usize,
    ) -> Self {
        Self {
            formatter,
            outbound,
            fanout_limit: fanout_limit.max(1),
        }
    }

    /// Render and send `post` to every recipient, at most `fanout_limit` at a
    /// time. A failure for one recipient is logged and does not affect the
    /// others. Nothing is retried.
    pub async fn dispatch(&self, post: Arc<Post>, recipients: BTreeSet<SubscriberId>) -> DispatchReport {
        let permits = Arc::new(Semaphore::new(self.fanout_limit));
        let mut set = JoinSet::new();
        let mut task_recipients = HashMap::new();

        for subscriber_id in recipients {
            let permits = Arc::clone(&permits);
            let formatter = Arc::clone(&self.formatter);
            let outbound = Arc::clone(&self.outbound);
            let post = Arc::clone(&post);
            let handle = set.spawn(async move {
                let _permit = permits.acquire_owned().await;
                deliver(&formatter, outbound.as_ref(), &post, subscriber_id).await
            });
            task_recipients.insert(handle.id(), subscriber_id);
        }

        let mut report = DispatchReport::default();
        while let Some(joined) = set.join_next_with_id().await {
            let (task_id, result) = match joined {
                Ok((task_id, result)) => (task_id, result),
                Err(e) => {
                    let task_id = e.id();
                    let subscriber_id = task_recipients.remove(&task_id);
                    error!(post_id = post.primary_id, ?subscriber_id, error = %e, "delivery task panicked");
                    report.panicked += 1;
                    report.failed.extend(subscriber_id);
                    continue;
                },
            };
            let Some(subscriber_id) = task_recipients.remove(&task_id) else {
                continue;
            };
            match result {
                Ok(()) => {
                    info!(post_id = post.primary_id, subscriber_id, "delivered");
                    report.delivered.insert(subscriber_id);
                },
                Err(e) => {
                    warn!(post_id = post.primary_id, subscriber_id, error = %e, "delivery failed");
                    report.failed.insert(subscriber_id);
                },
            }
        }
        report
    }
}

async fn deliver(
    formatter: &DeliveryFormatter,
    outbound: &dyn ChannelOutbound,
    post: &Post,
    subscriber_id: SubscriberId,
) -> Result<()> {
    let payload = formatter.render(post, subscriber_id).await?;
    DeliveryJob {
        subscriber_id,
        payload,
    }
    .send(outbound)
    .await
}
