use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    command::{parse_command, Command},
    domain::{ChatId, Message},
    errors::Error,
    security::{is_authorized, AllowList},
    source::{CommandSink, UpdateSource},
    Result,
};

pub const HELP_TEXT: &str = "<b>Available commands:</b>\n\
• /record - record a 60 second video (default)\n\
• /record 30 - record the given number of seconds (5-600)\n\
• 录制 or 录制30 - same, Chinese keyword\n\
• /photo - take a photo\n\
• 拍照 - same, Chinese keyword\n\
• /status - check that the bot is running\n\
• /help - show this message";

pub const STATUS_TEXT: &str = "✅ Bot is running";

pub const UNRECOGNIZED_TEXT: &str = "Unrecognized command. Send /help to see what I understand.";

fn record_ack(duration_seconds: u32) -> String {
    format!("Record command received, recording {duration_seconds} seconds of video...")
}

const PHOTO_ACK: &str = "Photo command received, taking a photo...";

/// What happened to a message handed to [`CommandDispatcher::dispatch`].
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Chat is not on the allow-list; nothing was parsed or sent.
    Unauthorized,
    /// Message had no text.
    NoText,
    /// A static reply was sent on the calling task.
    Replied(Command),
    /// Acknowledge-then-trigger is running on its own task.
    Triggered { command: Command, task: JoinHandle<()> },
}

#[derive(Clone, Copy, Debug)]
enum Trigger {
    Record { duration_seconds: u32 },
    Photo,
}

/// Routes a parsed command to a reply and/or a host action.
#[derive(Clone)]
pub struct CommandDispatcher {
    source: Arc<dyn UpdateSource>,
    sink: Arc<dyn CommandSink>,
    allowed: AllowList,
}

impl CommandDispatcher {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        sink: Arc<dyn CommandSink>,
        allowed: AllowList,
    ) -> Self {
        if allowed.is_empty() {
            tracing::warn!("allow-list is empty, every command will be dropped");
        }
        Self {
            source,
            sink,
            allowed,
        }
    }

    /// Handle one message.
    ///
    /// Record/Photo never block the caller: the acknowledgement and the action run on a
    /// spawned task. An `Err` means a static reply could not be sent.
    pub async fn dispatch(&self, message: &Message) -> Result<DispatchOutcome> {
        let chat_id = message.chat_id;
        if !is_authorized(Some(chat_id), &self.allowed) {
            tracing::debug!(chat_id = chat_id.0, "chat not in allow-list, dropping message");
            return Ok(DispatchOutcome::Unauthorized);
        }

        let Some(text) = message.text.as_deref() else {
            return Ok(DispatchOutcome::NoText);
        };

        let command = parse_command(text);
        tracing::info!(
            chat_id = chat_id.0,
            chat_kind = message.chat_kind.as_str(),
            command = command.name(),
            "received command"
        );

        match command {
            Command::Record { duration_seconds } => {
                let task = self.spawn_trigger(
                    chat_id,
                    record_ack(duration_seconds),
                    Trigger::Record { duration_seconds },
                );
                Ok(DispatchOutcome::Triggered { command, task })
            }
            Command::Photo => {
                let task = self.spawn_trigger(chat_id, PHOTO_ACK.to_string(), Trigger::Photo);
                Ok(DispatchOutcome::Triggered { command, task })
            }
            Command::Help => self.reply(chat_id, command, HELP_TEXT).await,
            Command::Status => self.reply(chat_id, command, STATUS_TEXT).await,
            Command::Unrecognized => self.reply(chat_id, command, UNRECOGNIZED_TEXT).await,
        }
    }

    async fn reply(&self, chat_id: ChatId, command: Command, text: &str) -> Result<DispatchOutcome> {
        self.source
            .send_message(chat_id, text)
            .await
            .map_err(|e| Error::Send(format!("{} reply to {chat_id}: {e}", command.name())))?;
        Ok(DispatchOutcome::Replied(command))
    }

    fn spawn_trigger(&self, chat_id: ChatId, ack: String, trigger: Trigger) -> JoinHandle<()> {
        let source = self.source.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = source.send_message(chat_id, &ack).await {
                tracing::warn!(
                    chat_id = chat_id.0,
                    error = %e,
                    "acknowledgement failed, triggering anyway"
                );
            }
            match trigger {
                Trigger::Record { duration_seconds } => {
                    sink.trigger_recording(chat_id, duration_seconds).await
                }
                Trigger::Photo => sink.trigger_photo(chat_id).await,
            }
        })
    }
}
