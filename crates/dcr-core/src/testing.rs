//! In-memory fakes for the engine ports, shared by unit tests.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{BotIdentity, ChatId, Update},
    errors::Error,
    source::{ChatAction, CommandSink, UpdateSource},
    Result,
};

/// One observable side effect, in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// A `send_message` attempt, successful or not.
    Send(ChatId, String),
    Sink(SinkCall),
}

/// Ordered log shared between a [`FakeSource`] and a [`RecordingSink`].
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Step>>>);

impl Journal {
    fn push(&self, step: Step) {
        self.0.lock().unwrap().push(step);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.0.lock().unwrap().clone()
    }
}

/// Scriptable [`UpdateSource`].
///
/// `identify` pops scripted results and succeeds once the script is empty.
/// `fetch_updates` pops scripted batches and, once they run out, parks like an
/// idle long poll until the caller cancels it.
#[derive(Default)]
pub struct FakeSource {
    identify_script: Mutex<VecDeque<Result<BotIdentity>>>,
    identify_calls: AtomicUsize,
    batches: Mutex<VecDeque<Result<Vec<Update>>>>,
    fetch_offsets: Mutex<Vec<i64>>,
    fail_sends: AtomicBool,
    send_attempts: AtomicUsize,
    sent: Mutex<Vec<(ChatId, String)>>,
    actions: Mutex<Vec<(ChatId, ChatAction)>>,
    photos: Mutex<Vec<(ChatId, PathBuf, String)>>,
    failing_photos: Mutex<Vec<PathBuf>>,
    journal: Journal,
}

impl FakeSource {
    pub fn with_journal(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            ..Self::default()
        }
    }

    pub fn fail_identify(&self, times: usize) {
        let mut script = self.identify_script.lock().unwrap();
        for _ in 0..times {
            script.push_back(Err(Error::External("getMe: connection refused".to_string())));
        }
    }

    pub fn push_batch(&self, updates: Vec<Update>) {
        self.batches.lock().unwrap().push_back(Ok(updates));
    }

    pub fn push_fetch_error(&self) {
        self.batches
            .lock()
            .unwrap()
            .push_back(Err(Error::External("getUpdates: timed out".to_string())));
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_photo(&self, path: &Path) {
        self.failing_photos.lock().unwrap().push(path.to_path_buf());
    }

    pub fn identify_calls(&self) -> usize {
        self.identify_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_offsets(&self) -> Vec<i64> {
        self.fetch_offsets.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    pub fn actions(&self) -> Vec<(ChatId, ChatAction)> {
        self.actions.lock().unwrap().clone()
    }

    pub fn photos(&self) -> Vec<(ChatId, PathBuf, String)> {
        self.photos.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateSource for FakeSource {
    async fn identify(&self) -> Result<BotIdentity> {
        self.identify_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.identify_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(BotIdentity {
                id: 4242,
                username: "dashcam_bot".to_string(),
            })
        })
    }

    async fn fetch_updates(
        &self,
        offset: i64,
        _timeout: Duration,
        _limit: u8,
    ) -> Result<Vec<Update>> {
        self.fetch_offsets.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => std::future::pending().await,
        }
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        self.journal.push(Step::Send(chat_id, text.to_string()));
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::External("sendMessage: bad gateway".to_string()));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        self.actions.lock().unwrap().push((chat_id, action));
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, path: &Path, caption: &str) -> Result<()> {
        if self.failing_photos.lock().unwrap().iter().any(|p| p == path) {
            return Err(Error::External("sendPhoto: request entity too large".to_string()));
        }
        self.photos
            .lock()
            .unwrap()
            .push((chat_id, path.to_path_buf(), caption.to_string()));
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkCall {
    Record(ChatId, u32),
    Photo(ChatId),
}

#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
    journal: Journal,
}

impl RecordingSink {
    pub fn with_journal(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: SinkCall) {
        self.journal.push(Step::Sink(call.clone()));
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CommandSink for RecordingSink {
    async fn trigger_recording(&self, chat_id: ChatId, duration_seconds: u32) {
        self.record(SinkCall::Record(chat_id, duration_seconds));
    }

    async fn trigger_photo(&self, chat_id: ChatId) {
        self.record(SinkCall::Photo(chat_id));
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
