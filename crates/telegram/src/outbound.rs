use {
    async_trait::async_trait,
    postwatch_channels::{
        ChannelOutbound, Error as ChannelError, GroupItem, MediaFetcher, PhotoUpload,
        Result as ChannelResult,
    },
    postwatch_common::{MediaRef, SubscriberId},
    teloxide::{
        RequestError,
        prelude::*,
        types::{InputFile, InputMedia, InputMediaPhoto},
    },
    tracing::{debug, info},
};

/// Bot API send primitive and file downloader.
///
/// Every call is attempted once. A `429` becomes
/// [`ChannelError::RateLimited`] for the caller to log; nothing waits and
/// resends.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
    http: reqwest::Client,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            http: reqwest::Client::new(),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn delivery_error(context: &str, error: RequestError) -> ChannelError {
    match error {
        RequestError::RetryAfter(wait) => ChannelError::RateLimited {
            retry_after_secs: wait.duration().as_secs(),
        },
        other => ChannelError::external(context.to_string(), other),
    }
}

fn input_file(photo: PhotoUpload) -> InputFile {
    InputFile::memory(photo.bytes).file_name(photo.file_name)
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send_text(&self, to: SubscriberId, text: &str) -> ChannelResult<()> {
        self.bot
            .send_message(ChatId(to), text)
            .await
            .map_err(|e| delivery_error("telegram sendMessage", e))?;
        info!(chat_id = to, text_len = text.len(), "telegram text sent");
        Ok(())
    }

    async fn send_photo(
        &self,
        to: SubscriberId,
        photo: PhotoUpload,
        caption: &str,
    ) -> ChannelResult<()> {
        let mut req = self.bot.send_photo(ChatId(to), input_file(photo));
        if !caption.is_empty() {
            req = req.caption(caption);
        }
        req.await
            .map_err(|e| delivery_error("telegram sendPhoto", e))?;
        info!(chat_id = to, caption_len = caption.len(), "telegram photo sent");
        Ok(())
    }

    async fn send_photo_group(&self, to: SubscriberId, items: Vec<GroupItem>) -> ChannelResult<()> {
        if items.is_empty() {
            return Err(ChannelError::invalid_input("empty photo group"));
        }
        let count = items.len();
        let media: Vec<InputMedia> = items
            .into_iter()
            .map(|item| {
                let photo = InputMediaPhoto::new(input_file(item.photo));
                InputMedia::Photo(match item.caption {
                    Some(caption) if !caption.is_empty() => photo.caption(caption),
                    _ => photo,
                })
            })
            .collect();
        self.bot
            .send_media_group(ChatId(to), media)
            .await
            .map_err(|e| delivery_error("telegram sendMediaGroup", e))?;
        info!(chat_id = to, count, "telegram photo group sent");
        Ok(())
    }
}

#[async_trait]
impl MediaFetcher for TelegramOutbound {
    async fn fetch(&self, media: &MediaRef) -> ChannelResult<Vec<u8>> {
        let file = self
            .bot
            .get_file(media.file_id.clone())
            .await
            .map_err(|e| delivery_error("telegram getFile", e))?;

        // https://api.telegram.org/file/bot<token>/<file_path>
        let url = self
            .bot
            .api_url()
            .join(&format!("file/bot{}/{}", self.bot.token(), file.path))
            .map_err(|e| ChannelError::external("build file url", e))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ChannelError::external("download telegram file", e))?;
        if !response.status().is_success() {
            return Err(ChannelError::unavailable(format!(
                "failed to download file {}: HTTP {}",
                media.file_id,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChannelError::external("read telegram file", e))?;
        debug!(file_id = %media.file_id, bytes = bytes.len(), "downloaded telegram file");
        Ok(bytes.to_vec())
    }
}
