//! Telegram adapter (teloxide).
//!
//! Implements the `dcr-core` UpdateSource port over the Telegram Bot API.

use std::{path::Path, time::Duration};

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode, UpdateKind},
};

use tokio::time::sleep;

use dcr_core::{
    domain::{BotIdentity, ChatId, ChatKind, Message, Update},
    errors::Error,
    source::{ChatAction, UpdateSource},
    Result,
};

/// Slack on top of the long-poll wait before the HTTP client gives up.
const TRANSPORT_SLACK: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct TelegramSource {
    bot: Bot,
}

impl TelegramSource {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Bot whose HTTP timeout outlasts a `poll_timeout` long poll.
    pub fn connect(token: &str, poll_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .tcp_nodelay(true)
            .timeout(poll_timeout + TRANSPORT_SLACK)
            .build()
            .map_err(|e| Error::Config(format!("telegram http client: {e}")))?;
        Ok(Self::new(Bot::with_client(token, client)))
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(retry_after = ?d, "telegram rate limited");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

/// Map a Telegram update to the engine's model.
///
/// Only plain `message` updates carry a message; edits, channel posts and
/// anything else still count for offset bookkeeping.
pub fn to_update(update: teloxide::types::Update) -> Update {
    let id = i64::from(update.id);
    let message = match update.kind {
        UpdateKind::Message(msg) => Some(to_message(&msg)),
        _ => None,
    };
    Update { id, message }
}

fn to_message(msg: &teloxide::types::Message) -> Message {
    let chat_kind = if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else if msg.chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    };

    Message {
        chat_id: ChatId(msg.chat.id.0),
        chat_kind,
        sent_at: msg.date.timestamp(),
        text: msg.text().map(|s| s.to_string()),
    }
}

#[async_trait]
impl UpdateSource for TelegramSource {
    async fn identify(&self) -> Result<BotIdentity> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| Error::Handshake(format!("getMe: {e}")))?;
        Ok(BotIdentity {
            id: me.user.id.0 as i64,
            username: me.username().to_string(),
        })
    }

    async fn fetch_updates(
        &self,
        offset: i64,
        timeout: Duration,
        limit: u8,
    ) -> Result<Vec<Update>> {
        let offset = i32::try_from(offset)
            .map_err(|_| Error::Fetch(format!("offset {offset} out of range")))?;
        let timeout_secs = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);

        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .timeout(timeout_secs)
            .limit(limit)
            .await
            .map_err(|e| Error::Fetch(format!("getUpdates: {e}")))?;

        Ok(updates.into_iter().map(to_update).collect())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(chat_id), text.to_string())
                .parse_mode(ParseMode::Html)
        })
        .await
        .map_err(|e| Error::Send(e.to_string()))?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let tg_action = match action {
            ChatAction::UploadPhoto => teloxide::types::ChatAction::UploadPhoto,
        };
        self.with_retry(|| self.bot.send_chat_action(Self::tg_chat(chat_id), tg_action))
            .await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, path: &Path, caption: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_photo(Self::tg_chat(chat_id), InputFile::file(path.to_path_buf()))
                .caption(caption.to_string())
        })
        .await
        .map_err(|e| Error::Send(format!("sendPhoto {}: {e}", path.display())))?;
        Ok(())
    }
}
