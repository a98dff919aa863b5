//! Fetched/analyzed id tracking, grounded on
//! `original_source/src/data_fetchers/ids_tracker.py`'s `IdsTracker`.
//!
//! The original exposes two module-level singleton accessors
//! (`get_fetched_tracker`/`get_analyzed_tracker`) that share one lazily
//! initialized global keyed only by first-caller path — calling one before
//! the other with a different path silently returns the wrong tracker. We
//! avoid that by making `fetched(path)`/`analyzed(path)` two independent,
//! explicitly constructed values; nothing here is a singleton.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::CoreResult;
use crate::persistence::{read_json_lenient, write_json_atomic};

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IdTrackerData {
    #[serde(default)]
    papers: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    news: BTreeMap<String, DateTime<Utc>>,
}

/// One `{papers, news}` id-set persisted at `file_path`, guarded by a mutex
/// against in-process concurrent mark/save races (spec §5).
pub struct IdTracker {
    file_path: PathBuf,
    retention_days: i64,
    data: Mutex<Option<IdTrackerData>>,
}

impl IdTracker {
    fn new(file_path: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            file_path: file_path.into(),
            retention_days,
            data: Mutex::new(None),
        }
    }

    /// Tracker over `data/fetched_ids.json` by convention, or any path.
    pub fn fetched(path: impl Into<PathBuf>) -> Self {
        Self::new(path, DEFAULT_RETENTION_DAYS)
    }

    /// Tracker over `data/analyzed_ids.json` by convention, or any path.
    pub fn analyzed(path: impl Into<PathBuf>) -> Self {
        Self::new(path, DEFAULT_RETENTION_DAYS)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    #[instrument(level = "debug", skip(self))]
    async fn load(&self) -> CoreResult<()> {
        let mut guard = self.data.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let loaded = read_json_lenient::<IdTrackerData>(&self.file_path)
            .await?
            .unwrap_or_default();
        info!(
            path = %self.file_path.display(),
            papers = loaded.papers.len(),
            news = loaded.news.len(),
            "id tracker loaded"
        );
        *guard = Some(loaded);
        Ok(())
    }

    async fn save_locked(&self, data: &IdTrackerData) -> CoreResult<()> {
        write_json_atomic(&self.file_path, data).await
    }

    pub async fn paper_ids(&self) -> CoreResult<std::collections::HashSet<String>> {
        self.load().await?;
        let guard = self.data.lock().await;
        Ok(guard.as_ref().unwrap().papers.keys().cloned().collect())
    }

    pub async fn news_ids(&self) -> CoreResult<std::collections::HashSet<String>> {
        self.load().await?;
        let guard = self.data.lock().await;
        Ok(guard.as_ref().unwrap().news.keys().cloned().collect())
    }

    pub async fn contains_paper(&self, id: &str) -> CoreResult<bool> {
        self.load().await?;
        let guard = self.data.lock().await;
        Ok(guard.as_ref().unwrap().papers.contains_key(id))
    }

    pub async fn contains_news(&self, id: &str) -> CoreResult<bool> {
        self.load().await?;
        let guard = self.data.lock().await;
        Ok(guard.as_ref().unwrap().news.contains_key(id))
    }

    /// Mark ids as seen "now" unless already present (first-seen timestamp
    /// is preserved), then persist.
    #[instrument(level = "debug", skip(self, ids))]
    pub async fn mark_papers(&self, ids: &[String]) -> CoreResult<()> {
        self.load().await?;
        let mut guard = self.data.lock().await;
        let data = guard.as_mut().unwrap();
        let now = Utc::now();
        for id in ids {
            data.papers.entry(id.clone()).or_insert(now);
        }
        self.save_locked(data).await
    }

    #[instrument(level = "debug", skip(self, ids))]
    pub async fn mark_news(&self, ids: &[String]) -> CoreResult<()> {
        self.load().await?;
        let mut guard = self.data.lock().await;
        let data = guard.as_mut().unwrap();
        let now = Utc::now();
        for id in ids {
            data.news.entry(id.clone()).or_insert(now);
        }
        self.save_locked(data).await
    }

    /// Drop entries older than `retention_days`; returns the number removed.
    /// Persists only if anything changed.
    #[instrument(level = "debug", skip(self))]
    pub async fn cleanup(&self) -> CoreResult<usize> {
        self.load().await?;
        let mut guard = self.data.lock().await;
        let data = guard.as_mut().unwrap();
        let cutoff = Utc::now() - Duration::days(self.retention_days);

        let before_papers = data.papers.len();
        data.papers.retain(|_, ts| *ts >= cutoff);
        let before_news = data.news.len();
        data.news.retain(|_, ts| *ts >= cutoff);

        let removed = (before_papers - data.papers.len()) + (before_news - data.news.len());
        if removed > 0 {
            warn!(removed, path = %self.file_path.display(), "cleaned up expired id records");
            self.save_locked(data).await?;
        }
        Ok(removed)
    }
}
