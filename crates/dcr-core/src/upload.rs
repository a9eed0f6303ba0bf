//! Photo upload back to the chat that asked for it.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::sync::mpsc;

use crate::{
    domain::ChatId,
    errors::Error,
    source::{ChatAction, UpdateSource},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadEvent {
    Progress(String),
    Success(String),
    Failed(String),
}

pub struct PhotoUploader {
    source: Arc<dyn UpdateSource>,
    delay: Duration,
    events: Option<mpsc::UnboundedSender<UploadEvent>>,
}

impl PhotoUploader {
    pub fn new(source: Arc<dyn UpdateSource>, delay: Duration) -> Self {
        Self {
            source,
            delay,
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<UploadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Upload `files` one by one, spaced by the configured delay.
    ///
    /// Missing files are skipped and single failures do not abort the batch.
    /// Returns the number of photos sent.
    pub async fn upload(&self, chat_id: ChatId, files: &[PathBuf]) -> Result<usize> {
        if files.is_empty() {
            return Err(self.fail("no photos to upload".to_string()));
        }

        let total = files.len();
        self.emit(UploadEvent::Progress(format!("uploading {total} photo(s)")));
        self.indicate(chat_id).await;

        let mut uploaded = 0usize;
        for (idx, path) in files.iter().enumerate() {
            if tokio::fs::metadata(path).await.is_err() {
                tracing::warn!(path = %path.display(), "photo file missing, skipping");
                continue;
            }

            let n = idx + 1;
            self.emit(UploadEvent::Progress(format!(
                "uploading ({n}/{total}): {}",
                file_name(path)
            )));
            self.indicate(chat_id).await;

            let caption = format!("Photo {n}/{total}");
            match self.source.send_photo(chat_id, path, &caption).await {
                Ok(()) => {
                    uploaded += 1;
                    tracing::debug!(chat_id = chat_id.0, path = %path.display(), "photo uploaded");
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "photo upload failed");
                    self.emit(UploadEvent::Failed(format!(
                        "upload failed: {} - {e}",
                        file_name(path)
                    )));
                }
            }

            if n < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        if uploaded == 0 {
            return Err(self.fail("all photo uploads failed".to_string()));
        }

        let summary = format!("✅ Upload complete: {uploaded} photo(s)");
        self.emit(UploadEvent::Success(summary.clone()));
        if let Err(e) = self.source.send_message(chat_id, &summary).await {
            tracing::warn!(chat_id = chat_id.0, error = %e, "upload summary not delivered");
        }
        Ok(uploaded)
    }

    async fn indicate(&self, chat_id: ChatId) {
        if let Err(e) = self
            .source
            .send_chat_action(chat_id, ChatAction::UploadPhoto)
            .await
        {
            tracing::debug!(chat_id = chat_id.0, error = %e, "chat action failed");
        }
    }

    fn fail(&self, reason: String) -> Error {
        self.emit(UploadEvent::Failed(reason.clone()));
        Error::Upload(reason)
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// The `limit` most recently modified regular files in `dir`, newest first.
pub fn newest_files(dir: &Path, limit: usize) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<(SystemTime, PathBuf)> = Vec::new();
    for ent in std::fs::read_dir(dir)?.flatten() {
        let Ok(md) = ent.metadata() else {
            continue;
        };
        if !md.is_file() {
            continue;
        }
        let modified = md.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push((modified, ent.path()));
    }
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(entries.into_iter().take(limit).map(|(_, p)| p).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSource;

    fn tmp(prefix: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let dir = PathBuf::from(format!("/tmp/{prefix}-{}-{ts}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn uploads_existing_files_and_reports_summary() {
        let dir = tmp("dcr-upload");
        let a = dir.join("front.jpg");
        let b = dir.join("rear.jpg");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let missing = dir.join("gone.jpg");

        let source = Arc::new(FakeSource::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let uploader = PhotoUploader::new(source.clone(), Duration::ZERO).with_events(tx);

        let n = uploader
            .upload(ChatId(7), &[a.clone(), missing, b.clone()])
            .await
            .unwrap();

        assert_eq!(n, 2);
        let photos = source.photos();
        assert_eq!(photos[0], (ChatId(7), a, "Photo 1/3".to_string()));
        assert_eq!(photos[1], (ChatId(7), b, "Photo 3/3".to_string()));
        assert_eq!(
            source.sent_texts(),
            vec!["✅ Upload complete: 2 photo(s)".to_string()]
        );
        assert!(source
            .actions()
            .iter()
            .all(|(_, action)| *action == ChatAction::UploadPhoto));

        let mut last = None;
        while let Ok(ev) = rx.try_recv() {
            last = Some(ev);
        }
        assert!(matches!(last, Some(UploadEvent::Success(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn single_failure_does_not_abort_batch() {
        let dir = tmp("dcr-upload-partial");
        let a = dir.join("1.jpg");
        let b = dir.join("2.jpg");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let source = Arc::new(FakeSource::default());
        source.fail_photo(&a);
        let uploader = PhotoUploader::new(source.clone(), Duration::ZERO);

        assert_eq!(uploader.upload(ChatId(1), &[a, b]).await.unwrap(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn empty_or_all_failed_is_an_error() {
        let source = Arc::new(FakeSource::default());
        let uploader = PhotoUploader::new(source.clone(), Duration::ZERO);

        let err = uploader.upload(ChatId(1), &[]).await.unwrap_err();
        assert!(matches!(err, Error::Upload(_)));

        let err = uploader
            .upload(ChatId(1), &[PathBuf::from("/nonexistent/dcr.jpg")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upload(ref m) if m.contains("all")));
        assert!(source.sent().is_empty());
    }

    #[test]
    fn newest_files_orders_by_mtime() {
        let dir = tmp("dcr-newest");
        let old = dir.join("a_old.jpg");
        let new = dir.join("b_new.jpg");
        std::fs::write(&old, b"o").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(&new, b"n").unwrap();
        std::fs::create_dir_all(dir.join("subdir")).unwrap();

        let files = newest_files(&dir, 5).unwrap();
        assert_eq!(files, vec![new.clone(), old]);
        assert_eq!(newest_files(&dir, 1).unwrap(), vec![new]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
