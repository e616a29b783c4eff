//! Local reading caches used as the history fallback.

use crate::error::{MonitorError, Result};
use crate::telemetry::data::{Reading, TimeRange};
use crate::telemetry::traits::ReadingCache;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Appends between two compactions of the cache file (one hour at the default period).
pub const DEFAULT_COMPACTION_INTERVAL: usize = 360;

/// Reading cache stored as one JSON object per line.
///
/// Readings older than the retention window (seven days by default) are
/// ignored on load and dropped from the file every
/// [`DEFAULT_COMPACTION_INTERVAL`] appends. Appends are serialized through a
/// lock so concurrent writers never interleave partial lines. Lines that fail
/// to parse are skipped.
pub struct FileReadingCache {
    path: PathBuf,
    retention: Duration,
    compaction_interval: usize,
    /// Appends since the last compaction
    write_lock: Mutex<usize>,
}

impl FileReadingCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retention: TimeRange::Last7Days.lookback(),
            compaction_interval: DEFAULT_COMPACTION_INTERVAL,
            write_lock: Mutex::new(0),
        }
    }

    /// Keep readings for `retention` instead of seven days.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Compact the file every `appends` appends.
    pub fn with_compaction_interval(mut self, appends: usize) -> Self {
        self.compaction_interval = appends.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, action: &str, e: impl std::fmt::Display) -> MonitorError {
        MonitorError::storage_error(format!("Failed to {} {}: {}", action, self.path.display(), e))
    }

    /// Read the file, keeping the readings still inside the retention window.
    async fn read_retained(&self) -> Result<Vec<Reading>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.storage_error("read", e)),
        };

        let cutoff = Utc::now() - self.retention;
        let mut readings = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Reading>(line) {
                Ok(reading) if reading.timestamp >= cutoff => readings.push(reading),
                Ok(_) => {}
                Err(e) => warn!(
                    "Skipping malformed line {} in {}: {}",
                    index + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(readings)
    }

    /// Rewrite the file with only the retained readings. Caller holds the write lock.
    async fn compact(&self) -> Result<()> {
        let retained = self.read_retained().await?;
        let mut contents = String::new();
        for reading in &retained {
            let line = serde_json::to_string(reading).map_err(|e| self.storage_error("encode", e))?;
            contents.push_str(&line);
            contents.push('\n');
        }

        let staging = self.path.with_extension("compacting");
        fs::write(&staging, contents)
            .await
            .map_err(|e| self.storage_error("compact", e))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| self.storage_error("replace", e))?;

        debug!("Compacted {} to {} readings", self.path.display(), retained.len());
        Ok(())
    }
}

#[async_trait]
impl ReadingCache for FileReadingCache {
    async fn load(&self) -> Result<Vec<Reading>> {
        self.read_retained().await
    }

    async fn append(&self, reading: &Reading) -> Result<()> {
        let mut line = serde_json::to_string(reading).map_err(|e| self.storage_error("encode", e))?;
        line.push('\n');

        let mut pending = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.storage_error("create directory for", e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.storage_error("open", e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.storage_error("write", e))?;
        file.flush().await.map_err(|e| self.storage_error("flush", e))?;
        drop(file);

        *pending += 1;
        if *pending >= self.compaction_interval {
            *pending = 0;
            // The reading is already stored; a failed compaction is retried later.
            if let Err(e) = self.compact().await {
                warn!("{}", e);
            }
        }
        Ok(())
    }
}

/// In-memory reading cache, bounded to the most recent `max_entries`.
#[derive(Debug)]
pub struct MemoryReadingCache {
    readings: RwLock<Vec<Reading>>,
    max_entries: usize,
}

impl Default for MemoryReadingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReadingCache {
    /// Seven days of readings at the default poll period.
    pub const DEFAULT_MAX_ENTRIES: usize = 7 * 24 * 360;

    pub fn new() -> Self {
        Self::with_max_entries(Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            readings: RwLock::new(Vec::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Cache pre-filled with the most recent `readings` that fit.
    pub fn from_readings(mut readings: Vec<Reading>) -> Self {
        let cache = Self::new();
        if readings.len() > cache.max_entries {
            readings.drain(..readings.len() - cache.max_entries);
        }
        *cache.readings.write() = readings;
        cache
    }

    pub fn len(&self) -> usize {
        self.readings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.read().is_empty()
    }
}

#[async_trait]
impl ReadingCache for MemoryReadingCache {
    async fn load(&self) -> Result<Vec<Reading>> {
        Ok(self.readings.read().clone())
    }

    async fn append(&self, reading: &Reading) -> Result<()> {
        let mut readings = self.readings.write();
        readings.push(*reading);
        if readings.len() > self.max_entries {
            let excess = readings.len() - self.max_entries;
            readings.drain(..excess);
        }
        Ok(())
    }
}
