//! Upload-and-analyze pipeline for match video.
//!
//! Drives one interactive workflow at a time: validate a selected file,
//! upload it, fan out to the requested inference services, and record the
//! terminal outcome in the shared [`queue::QueueStore`]. An ambient ticker
//! keeps items that nobody is watching moving as well.

use queue::{stage, QueueError};
use thiserror::Error;

pub mod config;
pub mod driver;
pub mod gateway;
pub mod orchestrator;
pub mod report;
pub mod select;
pub mod ticker;

#[cfg(test)]
pub(crate) mod testing;

pub use config::PipelineConfig;
pub use driver::{FixedDriver, ProgressDriver, SimulatedDriver};
pub use gateway::{GatewayError, HttpGateway, StaticToken, TokenProvider, UploadReceipt, VideoGateway};
pub use orchestrator::{AnalysisEvent, AnalysisOrchestrator, ServiceSelection};
pub use report::AnalysisReport;
pub use select::{FileCandidate, SelectedFile, MAX_UPLOAD_BYTES};
pub use ticker::AmbientTicker;

/// Which inference service a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceService {
    PlayerTracking,
    CrowdAnalysis,
}

impl std::fmt::Display for InferenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlayerTracking => write!(f, "player_tracking"),
            Self::CrowdAnalysis => write!(f, "crowd_analysis"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unsupported video format: {0} (accepted: mp4, mov, avi)")]
    UnsupportedFormat(String),
    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("no video file selected")]
    NoFileSelected,
    #[error("upload failed: {0}")]
    Upload(#[source] GatewayError),
    #[error("{service} inference failed: {source}")]
    Inference {
        service: InferenceService,
        #[source]
        source: GatewayError,
    },
    #[error("{service} inference timed out after {secs}s")]
    InferenceTimeout { service: InferenceService, secs: u64 },
    #[error("listing uploads failed: {0}")]
    Listing(#[source] GatewayError),
    #[error("deleting upload failed: {0}")]
    Delete(#[source] GatewayError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("workflow task failed: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Stage tag recorded on the queue item when this error ends a run.
    pub fn stage_tag(&self) -> String {
        match self {
            Self::Upload(_) => stage::UPLOAD_ERROR.to_string(),
            Self::InferenceTimeout { .. } => stage::reason::PROCESSING_TIMEOUT.to_string(),
            Self::Inference { source, .. } => match source {
                GatewayError::Inference { reason } if !reason.is_empty() => reason.clone(),
                _ => stage::reason::SERVER_OVERLOAD.to_string(),
            },
            _ => stage::UPLOAD_ERROR.to_string(),
        }
    }
}
