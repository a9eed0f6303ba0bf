//! Long-poll worker: handshake, fetch loop, offset bookkeeping.
//!
//! States: `Idle → Connecting → Connected → (Disconnected | Failed)`.
//!
//! - Only the startup handshake is retried with a bound (`max_handshake_attempts`,
//!   fixed delay). Exhausting it leaves the poller `Failed` until `start()` is
//!   called again.
//! - Inside the fetch loop, fetch errors are retried forever at a fixed interval.
//! - Every observed update moves the offset to `id + 1`, persisted before the
//!   next fetch, whether it was dispatched, stale, unauthorized or textless.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    dispatcher::{CommandDispatcher, DispatchOutcome},
    domain::{BotIdentity, Update},
    errors::Error,
    events::{ConnectionEvent, ConnectionState, EventSender},
    offset::OffsetStore,
    source::UpdateSource,
};

#[derive(Clone, Debug)]
pub struct PollerConfig {
    /// Server-side long-poll wait.
    pub poll_timeout: Duration,
    /// Max updates per fetch.
    pub poll_limit: u8,
    /// Messages older than this are acknowledged but not acted upon.
    pub message_expiry: Duration,
    pub max_handshake_attempts: u32,
    pub handshake_retry_delay: Duration,
    pub fetch_retry_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(30),
            poll_limit: 5,
            message_expiry: Duration::from_secs(600),
            max_handshake_attempts: 5,
            handshake_retry_delay: Duration::from_secs(5),
            fetch_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Cloneable handle to one long-poll worker.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    cfg: PollerConfig,
    source: Arc<dyn UpdateSource>,
    offsets: Arc<dyn OffsetStore>,
    dispatcher: CommandDispatcher,
    events: EventSender,
    state: watch::Sender<ConnectionState>,
    offset: AtomicI64,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

enum Handshake {
    Connected(BotIdentity),
    Failed(Error),
    Cancelled,
}

impl Poller {
    pub fn new(
        cfg: PollerConfig,
        source: Arc<dyn UpdateSource>,
        offsets: Arc<dyn OffsetStore>,
        dispatcher: CommandDispatcher,
        events: EventSender,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            inner: Arc::new(PollerInner {
                cfg,
                source,
                offsets,
                dispatcher,
                events,
                state,
                offset: AtomicI64::new(0),
                running: AtomicBool::new(false),
                cancel: Mutex::new(None),
            }),
        }
    }

    /// Spawn the worker. Returns `false` (and does nothing) if one is already alive.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("poller already running");
            return false;
        }

        let cancel = CancellationToken::new();
        if let Ok(mut slot) = self.inner.cancel.lock() {
            *slot = Some(cancel.clone());
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run(&cancel).await;
            inner.running.store(false, Ordering::SeqCst);
        });
        true
    }

    /// Ask the worker to stop and return immediately.
    ///
    /// A blocked fetch or retry wait is interrupted; `Disconnected` is published
    /// once the worker has wound down.
    pub fn stop(&self) {
        let token = self.inner.cancel.lock().ok().and_then(|mut slot| slot.take());
        match token {
            Some(token) => {
                tracing::info!("stopping poller");
                token.cancel();
            }
            None => tracing::debug!("stop requested but poller is not running"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Next update id the worker will request.
    pub fn offset(&self) -> i64 {
        self.inner.offset.load(Ordering::SeqCst)
    }
}

impl PollerInner {
    async fn run(&self, cancel: &CancellationToken) {
        let bot = match self.handshake(cancel).await {
            Handshake::Connected(bot) => bot,
            Handshake::Failed(e) => {
                tracing::error!(error = %e, "giving up on remote control startup");
                self.set_state(ConnectionState::Failed);
                self.publish(ConnectionEvent::Error {
                    message: format!("startup failed: {e}"),
                });
                return;
            }
            Handshake::Cancelled => {
                self.set_state(ConnectionState::Disconnected);
                self.publish(ConnectionEvent::Disconnected);
                return;
            }
        };

        tracing::info!(bot = %bot.username, bot_id = bot.id, "connected");
        self.set_state(ConnectionState::Connected);
        self.publish(ConnectionEvent::Connected { bot });

        let offset = match self.offsets.load() {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "failed to load offset, starting from 0");
                0
            }
        };
        self.offset.store(offset, Ordering::SeqCst);

        self.fetch_loop(cancel, offset).await;

        tracing::info!("poller stopped");
        self.set_state(ConnectionState::Disconnected);
        self.publish(ConnectionEvent::Disconnected);
    }

    async fn handshake(&self, cancel: &CancellationToken) -> Handshake {
        let max_attempts = self.cfg.max_handshake_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.set_state(ConnectionState::Connecting);
            tracing::debug!(attempt, "verifying bot credentials");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Handshake::Cancelled,
                r = self.source.identify() => r,
            };

            let err = match result {
                Ok(bot) => return Handshake::Connected(bot),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                return Handshake::Failed(Error::Handshake(format!(
                    "{attempt} attempts failed, last error: {err}"
                )));
            }

            tracing::warn!(
                attempt,
                max_attempts,
                retry_in_ms = self.cfg.handshake_retry_delay.as_millis() as u64,
                error = %err,
                "handshake failed, retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Handshake::Cancelled,
                _ = tokio::time::sleep(self.cfg.handshake_retry_delay) => {}
            }
        }
    }

    async fn fetch_loop(&self, cancel: &CancellationToken, mut offset: i64) {
        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                r = self.source.fetch_updates(offset, self.cfg.poll_timeout, self.cfg.poll_limit) => r,
            };

            match fetched {
                Ok(updates) => {
                    offset = self
                        .process_batch(updates, offset, Utc::now().timestamp())
                        .await;
                }
                Err(e) => {
                    let err = Error::Fetch(e.to_string());
                    tracing::warn!(error = %err, offset, "poll failed, retrying");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.cfg.fetch_retry_delay) => {}
                    }
                }
            }
        }
    }

    /// Handle one fetched batch relative to `now` (unix seconds); returns the new offset.
    async fn process_batch(&self, mut updates: Vec<Update>, mut offset: i64, now: i64) -> i64 {
        updates.sort_by_key(|u| u.id);
        let expiry = self.cfg.message_expiry.as_secs() as i64;

        for update in updates {
            if update.id < offset {
                tracing::debug!(update_id = update.id, offset, "already handled, skipping");
                continue;
            }

            match &update.message {
                Some(message) if message.age_at(now) > expiry => {
                    tracing::info!(
                        update_id = update.id,
                        sent_at = message.sent_at,
                        age_secs = message.age_at(now),
                        "ignoring stale message"
                    );
                }
                Some(message) => match self.dispatcher.dispatch(message).await {
                    Ok(DispatchOutcome::Triggered { command, .. }) => {
                        tracing::debug!(
                            update_id = update.id,
                            command = command.name(),
                            "command triggered"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(update_id = update.id, error = %e, "dispatch failed");
                    }
                },
                None => tracing::debug!(update_id = update.id, "update without message"),
            }

            offset = self.commit(update.id + 1);
        }

        offset
    }

    /// Persist `next`, then advance.
    fn commit(&self, next: i64) -> i64 {
        if let Err(e) = self.offsets.save(next) {
            tracing::error!(offset = next, error = %e, "failed to persist offset");
        }
        self.offset.store(next, Ordering::SeqCst);
        next
    }

    fn set_state(&self, state: ConnectionState) {
        let prev = self.state.send_replace(state);
        if prev != state {
            tracing::debug!(from = prev.as_str(), to = state.as_str(), "connection state");
        }
    }

    fn publish(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("no connection observer attached");
        }
    }
}
