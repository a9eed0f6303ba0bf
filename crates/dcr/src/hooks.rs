//! Host actions: run configured shell hooks when a command fires.

use std::{path::PathBuf, process::ExitStatus};

use async_trait::async_trait;
use tokio::process::Command;

use dcr_core::{
    config::Config,
    domain::ChatId,
    source::CommandSink,
    upload::{newest_files, PhotoUploader},
};

pub struct HookSink {
    record_hook: Option<String>,
    photo_hook: Option<String>,
    photo_dir: Option<PathBuf>,
    photo_upload_count: usize,
    uploader: PhotoUploader,
}

impl HookSink {
    pub fn new(cfg: &Config, uploader: PhotoUploader) -> Self {
        Self {
            record_hook: cfg.record_hook.clone(),
            photo_hook: cfg.photo_hook.clone(),
            photo_dir: cfg.photo_dir.clone(),
            photo_upload_count: cfg.photo_upload_count,
            uploader,
        }
    }

    async fn upload_latest(&self, chat_id: ChatId) {
        let Some(dir) = &self.photo_dir else {
            return;
        };
        let files = match newest_files(dir, self.photo_upload_count) {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "cannot list photos");
                return;
            }
        };
        match self.uploader.upload(chat_id, &files).await {
            Ok(n) => tracing::info!(chat_id = chat_id.0, uploaded = n, "photos uploaded"),
            Err(e) => tracing::error!(chat_id = chat_id.0, error = %e, "photo upload failed"),
        }
    }
}

#[async_trait]
impl CommandSink for HookSink {
    async fn trigger_recording(&self, chat_id: ChatId, duration_seconds: u32) {
        let Some(hook) = &self.record_hook else {
            tracing::warn!(chat_id = chat_id.0, duration_seconds, "RECORD_HOOK not set, ignoring");
            return;
        };
        let env = [
            ("DCR_CHAT_ID", chat_id.0.to_string()),
            ("DCR_DURATION", duration_seconds.to_string()),
        ];
        report("record", run_hook(hook, &env).await);
    }

    async fn trigger_photo(&self, chat_id: ChatId) {
        let Some(hook) = &self.photo_hook else {
            tracing::warn!(chat_id = chat_id.0, "PHOTO_HOOK not set, ignoring");
            return;
        };
        let env = [("DCR_CHAT_ID", chat_id.0.to_string())];
        if report("photo", run_hook(hook, &env).await) {
            self.upload_latest(chat_id).await;
        }
    }
}

/// Run `hook` through `sh -c` with extra environment variables.
pub async fn run_hook(hook: &str, env: &[(&str, String)]) -> std::io::Result<ExitStatus> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(hook);
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.status().await
}

fn report(name: &str, result: std::io::Result<ExitStatus>) -> bool {
    match result {
        Ok(status) if status.success() => {
            tracing::info!(hook = name, "hook finished");
            true
        }
        Ok(status) => {
            tracing::error!(hook = name, status = %status, "hook exited with failure");
            false
        }
        Err(e) => {
            tracing::error!(hook = name, error = %e, "hook could not be started");
            false
        }
    }
}
