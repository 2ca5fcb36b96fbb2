//! In-memory analysis store
//!
//! Results are keyed by `analysis_id` and live only as long as the process.
//! The store is bounded: inserting beyond `max_entries` evicts the oldest
//! result, and `purge_expired` drops results older than `max_age`. Evicted
//! entries are handed back so the caller can delete their image files.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ihub_common::config::RetentionConfig;
use ihub_common::{AnalysisResult, Severity};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A stored result and the files written for it
#[derive(Debug, Clone)]
pub struct StoredAnalysis {
    pub result: AnalysisResult,
    pub original_path: PathBuf,
    pub annotated_path: PathBuf,
    /// Set by `AnalysisStore::insert`
    pub stored_at: DateTime<Utc>,
}

impl StoredAnalysis {
    pub fn new(result: AnalysisResult, original_path: PathBuf, annotated_path: PathBuf) -> Self {
        Self {
            result,
            original_path,
            annotated_path,
            stored_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.result.analysis_id
    }
}

/// Eviction limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_entries: usize,
    pub max_age: Option<Duration>,
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            max_entries: config.max_entries.max(1),
            max_age: config
                .max_age_secs
                .and_then(|secs| Duration::try_seconds(secs.min(i64::MAX as u64) as i64)),
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&RetentionConfig::default())
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<Uuid, StoredAnalysis>,
    /// Insertion order, oldest first
    order: VecDeque<Uuid>,
}

impl StoreInner {
    fn remove(&mut self, id: &Uuid) -> Option<StoredAnalysis> {
        let removed = self.entries.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }
}

/// Shared handle to the analysis store
#[derive(Debug, Clone)]
pub struct AnalysisStore {
    inner: Arc<RwLock<StoreInner>>,
    policy: RetentionPolicy,
}

impl AnalysisStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            policy,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Insert a result, returning whatever had to be evicted to make room
    ///
    /// `stored_at` is stamped under the write lock so insertion order is also
    /// age order.
    pub async fn insert(&self, mut analysis: StoredAnalysis) -> Vec<StoredAnalysis> {
        let mut inner = self.inner.write().await;
        analysis.stored_at = Utc::now();
        let id = analysis.id();

        if inner.entries.insert(id, analysis).is_some() {
            inner.order.retain(|existing| *existing != id);
        }
        inner.order.push_back(id);

        let mut evicted = Vec::new();
        while inner.entries.len() > self.policy.max_entries {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if let Some(entry) = inner.entries.remove(&oldest) {
                evicted.push(entry);
            }
        }
        evicted
    }

    pub async fn get(&self, id: &Uuid) -> Option<StoredAnalysis> {
        self.inner.read().await.entries.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> Option<StoredAnalysis> {
        self.inner.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Newest-first results, optionally restricted to one severity
    pub async fn list(&self, severity: Option<Severity>, limit: usize) -> Vec<AnalysisResult> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.entries.get(id))
            .filter(|entry| severity.map_or(true, |s| entry.result.severity == s))
            .take(limit)
            .map(|entry| entry.result.clone())
            .collect()
    }

    /// Evict entries stored before `now - max_age`
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Vec<StoredAnalysis> {
        let Some(max_age) = self.policy.max_age else {
            return Vec::new();
        };
        let cutoff = now - max_age;

        let mut inner = self.inner.write().await;
        let mut evicted = Vec::new();
        // Insertion order is also age order
        while let Some(oldest) = inner.order.front().copied() {
            let expired = inner
                .entries
                .get(&oldest)
                .map_or(true, |entry| entry.stored_at < cutoff);
            if !expired {
                break;
            }
            inner.order.pop_front();
            if let Some(entry) = inner.entries.remove(&oldest) {
                evicted.push(entry);
            }
        }
        evicted
    }
}
