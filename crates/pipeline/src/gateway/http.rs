//! HTTP gateway implementation backed by reqwest.

use super::{GatewayError, StaticToken, TokenProvider, UploadReceipt, VideoGateway};
use crate::config::PipelineConfig;
use crate::select::SelectedFile;
use async_trait::async_trait;
use reqwest::multipart;
use std::sync::Arc;
use tracing::debug;

pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
    token: Arc<dyn TokenProvider>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, token: Arc<dyn TokenProvider>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            token,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.api_url.clone(),
            Arc::new(StaticToken(config.bearer_token.clone())),
        )
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.bearer_token() {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    /// Map a non-success response into the error `make` builds from the body.
    async fn reject<T>(
        response: reqwest::Response,
        make: impl FnOnce(String) -> GatewayError,
    ) -> Result<T, GatewayError> {
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthorized);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(make(format!("{status}: {body}")))
    }
}

#[async_trait]
impl VideoGateway for HttpGateway {
    async fn upload(&self, file: &SelectedFile) -> Result<UploadReceipt, GatewayError> {
        debug!(name = %file.name, bytes = file.size_bytes, "uploading video");

        let bytes = tokio::fs::read(&file.path).await?;
        let part = multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.mime)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .authorize(self.client.post(format!("{}/uploads/", self.base_url)))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Self::reject(response, |reason| GatewayError::Upload { reason }).await;
        }
        Ok(response.json().await?)
    }

    async fn run_player_tracking(
        &self,
        upload_id: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        debug!(upload_id, "running player tracking");

        let response = self
            .authorize(
                self.client
                    .post(format!("{}/inference/player/track", self.base_url)),
            )
            .json(&serde_json::json!({ "id": upload_id }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Self::reject(response, |reason| GatewayError::Inference { reason }).await;
        }
        Ok(response.json().await?)
    }

    async fn run_crowd_analysis(
        &self,
        upload_id: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        debug!(upload_id, "running crowd analysis");

        let response = self
            .authorize(
                self.client
                    .post(format!("{}/inference/crowd/{}", self.base_url, upload_id)),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Self::reject(response, |reason| GatewayError::Inference { reason }).await;
        }
        Ok(response.json().await?)
    }

    async fn list_uploads(&self) -> Result<Vec<UploadReceipt>, GatewayError> {
        let response = self
            .authorize(self.client.get(format!("{}/uploads/", self.base_url)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Self::reject(response, |reason| GatewayError::Upload { reason }).await;
        }
        Ok(response.json().await?)
    }

    async fn delete_upload(&self, upload_id: &str) -> Result<(), GatewayError> {
        let response = self
            .authorize(
                self.client
                    .delete(format!("{}/uploads/{}", self.base_url, upload_id)),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Self::reject(response, |reason| GatewayError::Upload { reason }).await;
        }
        Ok(())
    }
}
