//! Hand-rolled gateway fake for exercising the workflow without a backend.

use crate::gateway::{GatewayError, UploadReceipt, VideoGateway};
use crate::select::SelectedFile;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum ServiceOutcome {
    Succeed,
    Fail(&'static str),
    Hang,
}

pub struct MockGateway {
    pub upload_ok: bool,
    pub upload_delay_ms: u64,
    pub player: ServiceOutcome,
    pub player_delay_ms: u64,
    pub crowd: ServiceOutcome,
    pub crowd_delay_ms: u64,
    pub delete_ok: bool,
    pub listing: Vec<UploadReceipt>,
    pub deleted: Arc<Mutex<Vec<String>>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            upload_ok: true,
            upload_delay_ms: 1,
            player: ServiceOutcome::Succeed,
            player_delay_ms: 1,
            crowd: ServiceOutcome::Succeed,
            crowd_delay_ms: 1,
            delete_ok: true,
            listing: Vec::new(),
            deleted: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockGateway {
    pub fn with_listing(ids: Vec<&str>) -> Self {
        Self {
            listing: ids
                .into_iter()
                .map(|id| UploadReceipt {
                    id: id.to_string(),
                    original_filename: format!("{id}.mp4"),
                    created_at: Utc::now(),
                })
                .collect(),
            ..Self::default()
        }
    }

    async fn service(
        outcome: ServiceOutcome,
        delay_ms: u64,
        payload: Value,
    ) -> Result<Value, GatewayError> {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        match outcome {
            ServiceOutcome::Succeed => Ok(payload),
            ServiceOutcome::Fail(reason) => Err(GatewayError::Inference {
                reason: reason.to_string(),
            }),
            ServiceOutcome::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

#[async_trait]
impl VideoGateway for MockGateway {
    async fn upload(&self, file: &SelectedFile) -> Result<UploadReceipt, GatewayError> {
        tokio::time::sleep(Duration::from_millis(self.upload_delay_ms)).await;
        if !self.upload_ok {
            return Err(GatewayError::Upload {
                reason: "413: file too large".to_string(),
            });
        }
        Ok(UploadReceipt {
            id: "upload-1".to_string(),
            original_filename: file.name.clone(),
            created_at: Utc::now(),
        })
    }

    async fn run_player_tracking(&self, upload_id: &str) -> Result<Value, GatewayError> {
        Self::service(
            self.player,
            self.player_delay_ms,
            json!({ "upload_id": upload_id, "players_tracked": 36 }),
        )
        .await
    }

    async fn run_crowd_analysis(&self, upload_id: &str) -> Result<Value, GatewayError> {
        Self::service(
            self.crowd,
            self.crowd_delay_ms,
            json!({ "upload_id": upload_id, "peak_density": 0.93 }),
        )
        .await
    }

    async fn list_uploads(&self) -> Result<Vec<UploadReceipt>, GatewayError> {
        Ok(self.listing.clone())
    }

    async fn delete_upload(&self, upload_id: &str) -> Result<(), GatewayError> {
        if !self.delete_ok {
            return Err(GatewayError::Upload {
                reason: "500: delete failed".to_string(),
            });
        }
        self.deleted.lock().unwrap().push(upload_id.to_string());
        Ok(())
    }
}
