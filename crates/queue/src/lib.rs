use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub mod stage;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue item id already present: {0}")]
    DuplicateId(String),
    #[error("queue item is not in a failed state: {0}")]
    NotFailed(String),
}

/// Kind of analysis requested for an uploaded match video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisKind {
    HighlightGeneration,
    PlayerTracking,
    TacticalAnalysis,
    PerformanceAnalysis,
    CrowdAnalysis,
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighlightGeneration => write!(f, "Highlight Generation"),
            Self::PlayerTracking => write!(f, "Player Tracking"),
            Self::TacticalAnalysis => write!(f, "Tactical Analysis"),
            Self::PerformanceAnalysis => write!(f, "Performance Analysis"),
            Self::CrowdAnalysis => write!(f, "Crowd Analysis"),
        }
    }
}

/// Lifecycle state of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Uploading,
    Queued,
    Processing,
    Analyzing,
    Completed,
    Failed,
}

impl ItemStatus {
    /// Terminal states are only left again via an explicit retry.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uploading => "uploading",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Derived at creation from how many focus areas were ticked.
    pub fn from_focus_count(count: usize) -> Self {
        if count > 2 {
            Self::High
        } else if count > 0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One tracked video-analysis job.
///
/// Items are mutated in place (by id) through [`QueueStore::update`]. The
/// `ui_controlled` flag partitions items between the two progress drivers:
/// the interactive upload workflow owns its own items exclusively, the
/// ambient ticker owns everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub name: String,
    pub kind: AnalysisKind,
    pub status: ItemStatus,
    pub progress: u8,
    pub processing_stage: String,
    pub duration: String,
    pub size: String,
    pub size_bytes: u64,
    pub upload_time: DateTime<Utc>,
    pub completed_time: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub error_count: u32,
    pub retry_count: u32,
    pub ui_controlled: bool,
    /// Server-side upload id, once the file exists remotely.
    pub remote_id: Option<String>,
}

impl QueueItem {
    pub fn new(
        name: impl Into<String>,
        kind: AnalysisKind,
        size_bytes: u64,
        focus_count: usize,
        ui_controlled: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            status: ItemStatus::Uploading,
            progress: 0,
            processing_stage: stage::FILE_UPLOAD.to_string(),
            duration: "--:--".to_string(),
            size: format_size(size_bytes),
            size_bytes,
            upload_time: Utc::now(),
            completed_time: None,
            estimated_completion: None,
            priority: Priority::from_focus_count(focus_count),
            error_count: 0,
            retry_count: 0,
            ui_controlled,
            remote_id: None,
        }
    }

    /// Synthesize an item for an upload that already finished server-side.
    pub fn from_listing(
        remote_id: impl Into<String>,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let remote_id = remote_id.into();
        Self {
            id: remote_id.clone(),
            name: name.into(),
            kind: AnalysisKind::PlayerTracking,
            status: ItemStatus::Completed,
            progress: 100,
            processing_stage: stage::ANALYSIS_COMPLETE.to_string(),
            duration: "--:--".to_string(),
            size: "--".to_string(),
            size_bytes: 0,
            upload_time: created_at,
            completed_time: Some(created_at),
            estimated_completion: None,
            priority: Priority::Low,
            error_count: 0,
            retry_count: 0,
            ui_controlled: false,
            remote_id: Some(remote_id),
        }
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = duration.into();
        self
    }

    pub fn with_estimated_completion(mut self, eta: DateTime<Utc>) -> Self {
        self.estimated_completion = Some(eta);
        self
    }

    /// Raise progress toward `target`, never moving backwards.
    pub fn advance_progress(&mut self, target: u8) {
        self.progress = self.progress.max(target.min(100));
    }

    /// Upload finished: switch straight into the analysis phase with a small
    /// nonzero floor so the item never reads as stalled at zero.
    pub fn begin_analysis(&mut self) {
        self.status = ItemStatus::Analyzing;
        self.progress = 5;
        self.processing_stage = stage::VIDEO_ANALYSIS.to_string();
    }

    pub fn complete(&mut self) {
        self.status = ItemStatus::Completed;
        self.progress = 100;
        self.processing_stage = stage::ANALYSIS_COMPLETE.to_string();
        self.completed_time = Some(Utc::now());
        self.estimated_completion = None;
    }

    pub fn fail(&mut self, reason: &str) {
        self.status = ItemStatus::Failed;
        self.processing_stage = reason.to_string();
        self.error_count += 1;
    }

    /// Reset a failed item back to the waiting queue.
    pub fn requeue_for_retry(&mut self) {
        self.status = ItemStatus::Queued;
        self.progress = 0;
        self.processing_stage = stage::QUEUE_WAITING.to_string();
        self.completed_time = None;
        self.retry_count += 1;
    }
}

fn format_size(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Single source of truth for the ordered list of analysis jobs.
///
/// Insertion order is newest first. All mutation goes through the item-level
/// closure in [`update`](Self::update), applied atomically under the lock so
/// overlapping call sites never observe a partial patch. Last write wins.
#[derive(Clone, Default)]
pub struct QueueStore {
    items: Arc<Mutex<Vec<QueueItem>>>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a new item. The id generation scheme makes collisions
    /// practically impossible, but the invariant is still guarded.
    pub fn enqueue(&self, item: QueueItem) -> Result<(), QueueError> {
        let mut items = self.items.lock();
        if items.iter().any(|existing| existing.id == item.id) {
            return Err(QueueError::DuplicateId(item.id));
        }
        tracing::debug!(id = %item.id, name = %item.name, "enqueue");
        items.insert(0, item);
        Ok(())
    }

    /// Apply `patch` to the item matching `id`. Returns false if the item is
    /// gone, which is a legitimate race with removal and not an error.
    pub fn update<F>(&self, id: &str, patch: F) -> bool
    where
        F: FnOnce(&mut QueueItem),
    {
        let mut items = self.items.lock();
        match items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                patch(item);
                true
            }
            None => false,
        }
    }

    /// Delete the item if present; no-op otherwise.
    pub fn remove(&self, id: &str) -> bool {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|item| item.id != id);
        before != items.len()
    }

    /// Move a failed item back to `queued`, bumping its retry counter.
    pub fn retry(&self, id: &str) -> Result<(), QueueError> {
        let mut items = self.items.lock();
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| QueueError::NotFailed(id.to_string()))?;
        if item.status != ItemStatus::Failed {
            return Err(QueueError::NotFailed(id.to_string()));
        }
        item.requeue_for_retry();
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<QueueItem> {
        self.items.lock().iter().find(|item| item.id == id).cloned()
    }

    /// Point-in-time copy of the whole queue, newest first.
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
