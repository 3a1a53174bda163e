//! Per-recipient rendering of posts into send-ready payloads.

use std::sync::Arc;

use {
    postwatch_channels::MediaFetcher,
    postwatch_common::{MediaRef, Post, SubscriberId},
    postwatch_media::{StagedMedia, StagingArea},
    tracing::debug,
};

use crate::error::{Error, Result};

/// Maximum characters in a text message.
pub const TEXT_LIMIT: usize = 4096;
/// Maximum characters in a media caption.
pub const CAPTION_LIMIT: usize = 1024;

/// A post rendered for one recipient.
///
/// Photo variants own the staged media; dropping the payload releases it.
#[derive(Debug)]
pub enum RenderedPayload {
    Text(String),
    SinglePhoto {
        photo: StagedMedia,
        caption: String,
    },
    PhotoGroup {
        photos: StagedMedia,
        /// One entry per photo; only the first is `Some`.
        captions: Vec<Option<String>>,
    },
}

impl RenderedPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::SinglePhoto { .. } => "single_photo",
            Self::PhotoGroup { .. } => "photo_group",
        }
    }
}

pub struct DeliveryFormatter {
    fetcher: Arc<dyn MediaFetcher>,
    staging: StagingArea,
}

impl DeliveryFormatter {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, staging: StagingArea) -> Self {
        Self { fetcher, staging }
    }

    /// Render `post` for `subscriber_id`. Media is downloaded into a fresh
    /// staging directory per call; a failed download releases whatever was
    /// already staged.
    pub async fn render(&self, post: &Post, subscriber_id: SubscriberId) -> Result<RenderedPayload> {
        let text = compose(post);
        let payload = match post.media_refs.as_slice() {
            [] => RenderedPayload::Text(truncate(&text, TEXT_LIMIT)),
            [single] => RenderedPayload::SinglePhoto {
                photo: self
                    .stage(post, subscriber_id, std::slice::from_ref(single))
                    .await?,
                caption: truncate(&text, CAPTION_LIMIT),
            },
            refs => RenderedPayload::PhotoGroup {
                photos: self.stage(post, subscriber_id, refs).await?,
                captions: std::iter::once(Some(truncate(&text, CAPTION_LIMIT)))
                    .chain(std::iter::repeat_n(None, refs.len() - 1))
                    .collect(),
            },
        };
        debug!(
            post_id = post.primary_id,
            subscriber_id,
            kind = payload.kind(),
            "rendered"
        );
        Ok(payload)
    }

    async fn stage(
        &self,
        post: &Post,
        subscriber_id: SubscriberId,
        refs: &[MediaRef],
    ) -> Result<StagedMedia> {
        let label = format!("{}-{}-{}", post.chat_id, post.primary_id, subscriber_id);
        let mut staged = self.staging.acquire(&label)?;
        for media in refs {
            let bytes = self
                .fetcher
                .fetch(media)
                .await
                .map_err(|e| Error::render(format!("fetch {}", media.file_id), e))?;
            staged.stage(&bytes).await?;
        }
        Ok(staged)
    }
}

/// `<title>\n<link>\n\n<body>`, without trailing whitespace for link-only posts.
pub fn compose(post: &Post) -> String {
    let mut text = format!("{}\n{}\n\n{}", post.display_title(), post.link, post.body_text);
    text.truncate(text.trim_end().len());
    text
}

/// Cut `text` to at most `limit` characters, marking the cut with `…`.
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use postwatch_common::InboundMessage;

    use super::*;
    use crate::testing::{FakeFetcher, jobs_album};

    fn formatter(fetcher: Arc<FakeFetcher>, root: &std::path::Path) -> DeliveryFormatter {
        DeliveryFormatter::new(fetcher, StagingArea::new(Some(root.to_path_buf())))
    }

    fn staged_dirs(root: &std::path::Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn header_uses_title_then_link() {
        let post = Post::from_message(
            InboundMessage::new(5, -1001)
                .with_handle("@jobs")
                .with_title("Jobs Board")
                .with_text("hello"),
        );
        assert_eq!(compose(&post), "Jobs Board\nhttps://t.me/jobs/5\n\nhello");
    }

    #[test]
    fn link_only_post_has_no_trailing_blank_lines() {
        let post = Post::from_message(InboundMessage::new(5, -1001).with_handle("@jobs"));
        assert_eq!(compose(&post), "@jobs\nhttps://t.me/jobs/5");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(10);
        let cut = truncate(&long, 4);
        assert_eq!(cut.chars().count(), 4);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn text_post_renders_text() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let fmt = formatter(fetcher.clone(), root.path());
        let post = Post::from_message(
            InboundMessage::new(1, -1)
                .with_handle("@jobs")
                .with_text("x".repeat(5000)),
        );

        let RenderedPayload::Text(text) = fmt.render(&post, 9).await.unwrap() else {
            panic!("expected text payload");
        };
        assert_eq!(text.chars().count(), TEXT_LIMIT);
        assert!(fetcher.fetched.lock().unwrap().is_empty());
        assert_eq!(staged_dirs(root.path()), 0);
    }

    #[tokio::test]
    async fn single_media_renders_captioned_photo() {
        let root = tempfile::tempdir().unwrap();
        let fmt = formatter(Arc::new(FakeFetcher::default()), root.path());
        let post = Post::from_message(
            InboundMessage::new(1, -1)
                .with_handle("@jobs")
                .with_caption("rust role")
                .with_media("m"),
        );

        let payload = fmt.render(&post, 9).await.unwrap();
        let RenderedPayload::SinglePhoto { photo, caption } = &payload else {
            panic!("expected single photo, got {}", payload.kind());
        };
        assert_eq!(photo.len(), 1);
        assert!(caption.ends_with("rust role"));
        assert_eq!(staged_dirs(root.path()), 1);

        drop(payload);
        assert_eq!(staged_dirs(root.path()), 0);
    }

    #[tokio::test]
    async fn album_renders_group_with_first_caption_only() {
        let root = tempfile::tempdir().unwrap();
        let fmt = formatter(Arc::new(FakeFetcher::default()), root.path());
        let post = Post::from_album(jobs_album()).unwrap();

        let payload = fmt.render(&post, 9).await.unwrap();
        let RenderedPayload::PhotoGroup { photos, captions } = &payload else {
            panic!("expected photo group, got {}", payload.kind());
        };
        assert_eq!(photos.len(), 3);
        assert_eq!(captions.len(), 3);
        assert_eq!(
            captions[0].as_deref(),
            Some("@jobs\nhttps://t.me/jobs/100\n\ndata analyst role")
        );
        assert!(captions[1..].iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn failed_fetch_releases_staged_media() {
        let root = tempfile::tempdir().unwrap();
        let fmt = formatter(Arc::new(FakeFetcher::failing_on("m101")), root.path());
        let post = Post::from_album(jobs_album()).unwrap();

        let err = fmt.render(&post, 9).await.unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
        assert!(err.to_string().contains("m101"));
        assert_eq!(staged_dirs(root.path()), 0);
    }

    #[tokio::test]
    async fn each_recipient_gets_its_own_staging() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let fmt = formatter(fetcher.clone(), root.path());
        let post = Post::from_album(jobs_album()).unwrap();

        let a = fmt.render(&post, 1).await.unwrap();
        let b = fmt.render(&post, 2).await.unwrap();
        assert_eq!(staged_dirs(root.path()), 2);
        assert_eq!(fetcher.fetched.lock().unwrap().len(), 6);
        drop((a, b));
        assert_eq!(staged_dirs(root.path()), 0);
    }
}
