//! Connection status published by the poll worker.
//!
//! The worker never calls observers directly: it pushes [`ConnectionEvent`]s onto
//! a channel and the host drains it with [`run_observer`] on whichever single
//! context owns its UI/status state. Ordering is preserved.

use tokio::sync::mpsc;

use crate::domain::BotIdentity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected { bot: BotIdentity },
    Disconnected,
    Error { message: String },
}

pub type EventSender = mpsc::UnboundedSender<ConnectionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Receives connection transitions (status line, tray icon, notification...).
pub trait ConnectionObserver: Send {
    fn on_connected(&mut self, bot: &BotIdentity);
    fn on_disconnected(&mut self);
    fn on_error(&mut self, message: &str);
}

pub fn deliver(observer: &mut dyn ConnectionObserver, event: &ConnectionEvent) {
    match event {
        ConnectionEvent::Connected { bot } => observer.on_connected(bot),
        ConnectionEvent::Disconnected => observer.on_disconnected(),
        ConnectionEvent::Error { message } => observer.on_error(message),
    }
}

/// Drain `rx` into `observer` until every sender is dropped.
pub async fn run_observer(mut rx: EventReceiver, observer: &mut dyn ConnectionObserver) {
    while let Some(event) = rx.recv().await {
        deliver(observer, &event);
    }
}

/// Observer that only writes log records.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl ConnectionObserver for LoggingObserver {
    fn on_connected(&mut self, bot: &BotIdentity) {
        tracing::info!(bot = %bot.username, "remote control connected");
    }

    fn on_disconnected(&mut self) {
        tracing::info!("remote control disconnected");
    }

    fn on_error(&mut self, message: &str) {
        tracing::error!(error = message, "remote control error");
    }
}
