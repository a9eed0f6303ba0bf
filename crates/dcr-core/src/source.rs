use std::{path::Path, time::Duration};

use async_trait::async_trait;

use crate::{
    domain::{BotIdentity, ChatId, Update},
    Result,
};

/// Outgoing "chat action" indicator shown while a photo is being sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    UploadPhoto,
}

/// Hexagonal port for a chat platform that delivers updates by long polling.
///
/// Telegram is the implementation shipped today; the shape only assumes
/// "updates since offset" semantics so other platforms can fit behind it.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Handshake: validate credentials and return the bot identity.
    async fn identify(&self) -> Result<BotIdentity>;

    /// Fetch up to `limit` updates with `id >= offset`, waiting at most `timeout`
    /// server-side when none are pending.
    async fn fetch_updates(&self, offset: i64, timeout: Duration, limit: u8)
        -> Result<Vec<Update>>;

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;

    async fn send_photo(&self, chat_id: ChatId, path: &Path, caption: &str) -> Result<()>;
}

/// Host-side actions a command can trigger. Fire-and-forget from the engine's view.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn trigger_recording(&self, chat_id: ChatId, duration_seconds: u32);

    async fn trigger_photo(&self, chat_id: ChatId);
}
