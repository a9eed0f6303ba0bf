use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, poller::PollerConfig, Result};

/// Typed configuration, read from the environment (plus an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_allowed_chats: Vec<i64>,

    // Offset persistence
    pub offset_dir: PathBuf,

    // Long polling
    pub poll_timeout: Duration,
    pub poll_limit: u8,
    pub message_expiry: Duration,
    pub max_handshake_attempts: u32,
    pub handshake_retry_delay: Duration,
    pub fetch_retry_delay: Duration,

    // Host actions
    pub record_hook: Option<String>,
    pub photo_hook: Option<String>,
    pub photo_dir: Option<PathBuf>,
    pub photo_upload_count: usize,
    pub photo_upload_delay: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build from an arbitrary key lookup (the process environment in `load()`).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        let telegram_allowed_chats = parse_csv_i64(get("TELEGRAM_ALLOWED_CHATS"));

        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        if !has_bot_id_prefix(&telegram_bot_token) {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN must look like <bot id>:<secret>".to_string(),
            ));
        }
        if telegram_allowed_chats.is_empty() {
            return Err(Error::Config(
                "TELEGRAM_ALLOWED_CHATS environment variable is required".to_string(),
            ));
        }

        let offset_dir = PathBuf::from(
            get("OFFSET_DIR")
                .and_then(non_empty)
                .unwrap_or("/tmp/dashcam-remote".to_string()),
        );

        let defaults = PollerConfig::default();
        let poll_timeout = get_u64(&get, "POLL_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_timeout);
        let poll_limit = get_u64(&get, "POLL_LIMIT")
            .map(|v| v.clamp(1, 100) as u8)
            .unwrap_or(defaults.poll_limit);
        let message_expiry = get_u64(&get, "MESSAGE_EXPIRE_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.message_expiry);
        let max_handshake_attempts = get_u64(&get, "MAX_HANDSHAKE_ATTEMPTS")
            .map(|v| v.clamp(1, u32::MAX as u64) as u32)
            .unwrap_or(defaults.max_handshake_attempts);
        let handshake_retry_delay = get_u64(&get, "HANDSHAKE_RETRY_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.handshake_retry_delay);
        let fetch_retry_delay = get_u64(&get, "FETCH_RETRY_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.fetch_retry_delay);

        let record_hook = get("RECORD_HOOK").and_then(non_empty);
        let photo_hook = get("PHOTO_HOOK").and_then(non_empty);
        let photo_dir = get("PHOTO_DIR").and_then(non_empty).map(PathBuf::from);
        let photo_upload_count = get_u64(&get, "PHOTO_UPLOAD_COUNT").unwrap_or(4) as usize;
        let photo_upload_delay = Duration::from_millis(
            get_u64(&get, "PHOTO_UPLOAD_DELAY_MS").unwrap_or(2000),
        );

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_chats,
            offset_dir,
            poll_timeout,
            poll_limit,
            message_expiry,
            max_handshake_attempts,
            handshake_retry_delay,
            fetch_retry_delay,
            record_hook,
            photo_hook,
            photo_dir,
            photo_upload_count,
            photo_upload_delay,
        })
    }

    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            poll_timeout: self.poll_timeout,
            poll_limit: self.poll_limit,
            message_expiry: self.message_expiry,
            max_handshake_attempts: self.max_handshake_attempts,
            handshake_retry_delay: self.handshake_retry_delay,
            fetch_retry_delay: self.fetch_retry_delay,
        }
    }

    /// Numeric bot id prefix of the token (`<id>:<secret>`), used to key offset files.
    pub fn bot_key(&self) -> String {
        self.telegram_bot_token
            .split(':')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

fn has_bot_id_prefix(token: &str) -> bool {
    match token.trim().split_once(':') {
        Some((id, secret)) => {
            !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && !secret.is_empty()
        }
        None => false,
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn get_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    get(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
