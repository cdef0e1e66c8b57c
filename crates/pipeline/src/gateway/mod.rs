//! Gateway abstraction over the upload/inference backend.
//!
//! The orchestrator only depends on the trait; the HTTP implementation in
//! [`http`] talks to the real service.

pub mod http;

pub use http::HttpGateway;

use crate::select::SelectedFile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("upload rejected: {reason}")]
    Upload { reason: String },
    #[error("inference rejected: {reason}")]
    Inference { reason: String },
    #[error("not authorized")]
    Unauthorized,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Record the backend keeps for one uploaded video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: String,
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
}

/// Supplies the bearer credential attached to every request.
///
/// Clearing an expired credential and redirecting to login is the session
/// layer's job; the gateway only reports `Unauthorized`.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, or none for unauthenticated development backends.
pub struct StaticToken(pub Option<String>);

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[async_trait]
pub trait VideoGateway: Send + Sync {
    /// Push the selected file to the backend.
    async fn upload(&self, file: &SelectedFile) -> Result<UploadReceipt, GatewayError>;

    /// Run player tracking against an uploaded video.
    async fn run_player_tracking(&self, upload_id: &str)
        -> Result<serde_json::Value, GatewayError>;

    /// Run crowd analysis against an uploaded video.
    async fn run_crowd_analysis(&self, upload_id: &str)
        -> Result<serde_json::Value, GatewayError>;

    /// All uploads the backend knows about, for seeding the queue.
    async fn list_uploads(&self) -> Result<Vec<UploadReceipt>, GatewayError>;

    /// Remove an upload server-side.
    async fn delete_upload(&self, upload_id: &str) -> Result<(), GatewayError>;
}
