//! Pipeline configuration.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Backend API root, e.g. `http://127.0.0.1:8000/api/v1`.
    pub api_url: String,

    /// Bearer token attached to every gateway request.
    pub bearer_token: Option<String>,

    /// Per-service inference deadline.
    pub inference_timeout_secs: u64,

    /// Delay between upload progress steps.
    pub upload_step_millis: u64,

    /// Delay between analysis progress steps.
    pub analysis_step_millis: u64,

    /// Ambient ticker period.
    pub ticker_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000/api/v1".to_string(),
            bearer_token: None,
            inference_timeout_secs: 1800,
            upload_step_millis: 100,
            analysis_step_millis: 50,
            ticker_interval_secs: 2,
        }
    }
}

impl PipelineConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_inference_timeout(mut self, secs: u64) -> Self {
        self.inference_timeout_secs = secs;
        self
    }

    pub fn with_step_delays(mut self, upload_millis: u64, analysis_millis: u64) -> Self {
        self.upload_step_millis = upload_millis;
        self.analysis_step_millis = analysis_millis;
        self
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    pub fn upload_step(&self) -> Duration {
        Duration::from_millis(self.upload_step_millis)
    }

    pub fn analysis_step(&self) -> Duration {
        Duration::from_millis(self.analysis_step_millis)
    }

    pub fn ticker_interval(&self) -> Duration {
        Duration::from_secs(self.ticker_interval_secs)
    }

    /// Save configuration to JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}
