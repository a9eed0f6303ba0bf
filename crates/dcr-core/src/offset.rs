//! Durable "next update id" bookkeeping.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicI64, Ordering},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Persists the next update id to request.
///
/// Callers save *after* an update has been handled, so the stored value is
/// never ahead of what actually ran.
pub trait OffsetStore: Send + Sync {
    /// Stored offset, or 0 when nothing was persisted yet.
    fn load(&self) -> Result<i64>;

    fn save(&self, offset: i64) -> Result<()>;
}

/// Process-local store (tests, ephemeral runs).
#[derive(Debug, Default)]
pub struct MemoryOffsetStore {
    offset: AtomicI64,
}

impl MemoryOffsetStore {
    pub fn new(initial: i64) -> Self {
        Self {
            offset: AtomicI64::new(initial),
        }
    }
}

impl OffsetStore for MemoryOffsetStore {
    fn load(&self) -> Result<i64> {
        Ok(self.offset.load(Ordering::SeqCst))
    }

    fn save(&self, offset: i64) -> Result<()> {
        self.offset.store(offset, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct OffsetFileData {
    offset: i64,
    saved_at: String,
}

/// JSON file store, one file per bot.
#[derive(Clone, Debug)]
pub struct FileOffsetStore {
    path: PathBuf,
}

impl FileOffsetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/offset-<key>.json`; `key` is usually the bot id so several bots can share a dir.
    pub fn for_bot(dir: &Path, key: &str) -> Self {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self::new(dir.join(format!("offset-{safe}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OffsetStore for FileOffsetStore {
    fn load(&self) -> Result<i64> {
        if !self.path.exists() {
            return Ok(0);
        }
        let txt = fs::read_to_string(&self.path)?;
        if txt.trim().is_empty() {
            return Ok(0);
        }
        let data: OffsetFileData = serde_json::from_str(&txt)?;
        Ok(data.offset.max(0))
    }

    fn save(&self, offset: i64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let txt = serde_json::to_string(&OffsetFileData {
            offset,
            saved_at: Utc::now().to_rfc3339(),
        })?;

        // Write-then-rename so a crash mid-write never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, txt)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
