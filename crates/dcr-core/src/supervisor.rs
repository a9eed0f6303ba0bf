use crate::poller::Poller;

/// Process-scoped owner of the remote-control pollers.
///
/// The host builds one at startup and hands out references; pollers keep running
/// across UI churn until explicitly cleared or `stop_all()` is called.
#[derive(Default)]
pub struct RemoteServices {
    telegram: Option<Poller>,
}

impl RemoteServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (replacing and stopping any previous) Telegram poller.
    pub fn register_telegram(&mut self, poller: Poller) {
        if let Some(old) = self.telegram.replace(poller) {
            old.stop();
        }
        tracing::debug!("telegram service registered");
    }

    pub fn telegram(&self) -> Option<&Poller> {
        self.telegram.as_ref()
    }

    pub fn is_telegram_running(&self) -> bool {
        self.telegram.as_ref().is_some_and(Poller::is_running)
    }

    pub fn has_any_running(&self) -> bool {
        self.is_telegram_running()
    }

    pub fn clear_telegram(&mut self) {
        if let Some(poller) = self.telegram.take() {
            poller.stop();
        }
        tracing::debug!("telegram service cleared");
    }

    pub fn stop_all(&mut self) {
        tracing::info!("stopping all remote services");
        self.clear_telegram();
    }

    /// One-line summary for a status bar / persistent notification.
    pub fn status_description(&self) -> String {
        let mut parts = Vec::new();
        if let Some(poller) = self.telegram.as_ref().filter(|p| p.is_running()) {
            parts.push(format!("Telegram remote control {}", poller.state().as_str()));
        }
        if parts.is_empty() {
            return "Remote control idle".to_string();
        }
        parts.join(" / ")
    }
}
