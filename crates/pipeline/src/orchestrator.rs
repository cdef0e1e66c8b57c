//! Drives one upload-and-analyze run end to end.

use crate::config::PipelineConfig;
use crate::gateway::{UploadReceipt, VideoGateway};
use crate::report::AnalysisReport;
use crate::select::{validate, FileCandidate, SelectedFile};
use crate::{InferenceService, PipelineError};
use chrono::{Duration as ChronoDuration, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use queue::{AnalysisKind, ItemStatus, QueueItem, QueueStore};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Which inference services the run fans out to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceSelection {
    pub player_tracking: bool,
    pub crowd_analysis: bool,
}

impl ServiceSelection {
    pub fn both() -> Self {
        Self {
            player_tracking: true,
            crowd_analysis: true,
        }
    }
}

/// Observable workflow and queue transitions.
#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    Enqueued { id: String, name: String },
    UploadProgress { id: String, progress: u8 },
    Uploaded { id: String, remote_id: String },
    AnalysisProgress { id: String, progress: u8 },
    StatusChanged { id: String, status: ItemStatus },
    Completed { id: String },
    Failed { id: String, reason: String },
    Retried { id: String },
    Removed { id: String },
}

pub struct AnalysisOrchestrator {
    store: QueueStore,
    gateway: Arc<dyn VideoGateway>,
    config: PipelineConfig,
    tx_events: Sender<AnalysisEvent>,
    rx_events: Receiver<AnalysisEvent>,
    selected: Option<SelectedFile>,
    kind: AnalysisKind,
    focus_areas: Vec<String>,
    services: ServiceSelection,
    last_error: Option<String>,
    analysis_complete: bool,
}

impl AnalysisOrchestrator {
    pub fn new(store: QueueStore, gateway: Arc<dyn VideoGateway>, config: PipelineConfig) -> Self {
        let (tx_events, rx_events) = unbounded();
        Self {
            store,
            gateway,
            config,
            tx_events,
            rx_events,
            selected: None,
            kind: AnalysisKind::HighlightGeneration,
            focus_areas: Vec::new(),
            services: ServiceSelection::default(),
            last_error: None,
            analysis_complete: false,
        }
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn events(&self) -> Receiver<AnalysisEvent> {
        self.rx_events.clone()
    }

    pub fn event_sender(&self) -> Sender<AnalysisEvent> {
        self.tx_events.clone()
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.analysis_complete
    }

    /// Validate a candidate file. On failure the previous selection, if any,
    /// stays untouched.
    pub fn select_file(&mut self, candidate: FileCandidate) -> Result<(), PipelineError> {
        match validate(candidate) {
            Ok(file) => {
                info!(name = %file.name, bytes = file.size_bytes, "video selected");
                self.selected = Some(file);
                self.last_error = None;
                self.analysis_complete = false;
                Ok(())
            }
            Err(err) => {
                warn!(%err, "rejected video selection");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn set_kind(&mut self, kind: AnalysisKind) {
        self.kind = kind;
    }

    pub fn set_services(&mut self, services: ServiceSelection) {
        self.services = services;
    }

    pub fn set_focus_area(&mut self, area: &str, enabled: bool) {
        if enabled {
            if !self.focus_areas.iter().any(|a| a == area) {
                self.focus_areas.push(area.to_string());
            }
        } else {
            self.focus_areas.retain(|a| a != area);
        }
    }

    /// Run the whole workflow for the currently selected file.
    ///
    /// Every phase error is recorded as a terminal `failed` mutation on the
    /// queue item before it is returned, so the queue never loses track of a
    /// run that went wrong.
    pub async fn upload_and_analyze(&mut self) -> Result<AnalysisReport, PipelineError> {
        let file = self.selected.clone().ok_or(PipelineError::NoFileSelected)?;

        self.last_error = None;
        self.analysis_complete = false;

        let item = self.new_item(&file);
        let id = item.id.clone();
        self.store.enqueue(item)?;
        let _ = self.tx_events.send(AnalysisEvent::Enqueued {
            id: id.clone(),
            name: file.name.clone(),
        });

        match self.drive(&id, &file).await {
            Ok(report) => {
                self.analysis_complete = true;
                info!(id, "analysis complete");
                Ok(report)
            }
            Err(err) => {
                let reason = err.stage_tag();
                self.store.update(&id, |it| it.fail(&reason));
                let _ = self.tx_events.send(AnalysisEvent::Failed {
                    id: id.clone(),
                    reason: reason.clone(),
                });
                self.last_error = Some(err.to_string());
                warn!(id, %err, "analysis failed");
                Err(err)
            }
        }
    }

    fn new_item(&self, file: &SelectedFile) -> QueueItem {
        let mut rng = rand::thread_rng();
        let minutes = rng.gen_range(30..90);
        let seconds: u32 = rng.gen_range(0..60);
        let eta = Utc::now() + ChronoDuration::minutes(rng.gen_range(5..=15));

        QueueItem::new(
            file.name.clone(),
            self.kind,
            file.size_bytes,
            self.focus_areas.len(),
            true,
        )
        .with_duration(format!("{minutes}:{seconds:02}"))
        .with_estimated_completion(eta)
    }

    async fn drive(
        &self,
        id: &str,
        file: &SelectedFile,
    ) -> Result<AnalysisReport, PipelineError> {
        let receipt = self.upload_phase(id, file).await?;
        let (player, crowd) = self.analysis_phase(id, &receipt).await?;

        self.store.update(id, |it| it.complete());
        let _ = self
            .tx_events
            .send(AnalysisEvent::Completed { id: id.to_string() });

        Ok(AnalysisReport::assemble(
            &receipt,
            file,
            self.kind,
            self.focus_areas.clone(),
            player,
            crowd,
        ))
    }

    /// Upload the file while sweeping item progress 0→100 in fixed steps.
    /// The phase transition happens only after both the sweep and the
    /// gateway call have finished.
    async fn upload_phase(
        &self,
        id: &str,
        file: &SelectedFile,
    ) -> Result<UploadReceipt, PipelineError> {
        let gateway = self.gateway.clone();
        let upload_file = file.clone();
        let upload =
            tokio::spawn(async move { gateway.upload(&upload_file).await });

        let step = self.config.upload_step();
        for progress in (0..=100u8).step_by(5) {
            tokio::time::sleep(step).await;
            self.store.update(id, |it| it.advance_progress(progress));
            let _ = self.tx_events.send(AnalysisEvent::UploadProgress {
                id: id.to_string(),
                progress,
            });
        }

        let receipt = upload
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
            .map_err(PipelineError::Upload)?;

        let remote_id = receipt.id.clone();
        self.store.update(id, |it| {
            it.remote_id = Some(remote_id.clone());
            it.begin_analysis();
        });
        let _ = self.tx_events.send(AnalysisEvent::Uploaded {
            id: id.to_string(),
            remote_id: receipt.id.clone(),
        });
        let _ = self.tx_events.send(AnalysisEvent::StatusChanged {
            id: id.to_string(),
            status: ItemStatus::Analyzing,
        });

        Ok(receipt)
    }

    /// Fan out to the requested inference services and sweep progress while
    /// they run. Join policy is any-fail: the first error ends the phase and
    /// the sibling call is dropped.
    async fn analysis_phase(
        &self,
        id: &str,
        receipt: &UploadReceipt,
    ) -> Result<(Option<Value>, Option<Value>), PipelineError> {
        let gateway = self.gateway.clone();
        let upload_id = receipt.id.clone();
        let services = self.services;
        let deadline = self.config.inference_timeout();
        let inference = tokio::spawn(async move {
            run_services(gateway, &upload_id, services, deadline).await
        });

        let step = self.config.analysis_step();
        let mut progress = 5u8;
        while !inference.is_finished() {
            tokio::time::sleep(step).await;
            progress = (progress + 2).min(95);
            self.store.update(id, |it| it.advance_progress(progress));
            let _ = self.tx_events.send(AnalysisEvent::AnalysisProgress {
                id: id.to_string(),
                progress,
            });
        }

        inference
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
    }

    /// Move a failed item back to `queued` with a fresh completion estimate.
    pub fn retry(&self, id: &str) -> Result<(), PipelineError> {
        self.store.retry(id)?;
        let eta = Utc::now() + ChronoDuration::minutes(rand::thread_rng().gen_range(30..=90));
        self.store
            .update(id, |it| it.estimated_completion = Some(eta));
        let _ = self
            .tx_events
            .send(AnalysisEvent::Retried { id: id.to_string() });
        info!(id, "retry queued");
        Ok(())
    }

    /// Remove an item, deleting the server-side upload first when one
    /// exists. A gateway failure leaves the queue untouched.
    pub async fn remove(&self, id: &str) -> Result<(), PipelineError> {
        let Some(item) = self.store.get(id) else {
            return Ok(());
        };
        if let Some(remote_id) = &item.remote_id {
            self.gateway
                .delete_upload(remote_id)
                .await
                .map_err(PipelineError::Delete)?;
        }
        self.store.remove(id);
        let _ = self
            .tx_events
            .send(AnalysisEvent::Removed { id: id.to_string() });
        Ok(())
    }

    /// Seed the queue with uploads that already finished server-side.
    /// Returns how many items were added.
    pub async fn seed_from_listing(&self) -> Result<usize, PipelineError> {
        let receipts = self
            .gateway
            .list_uploads()
            .await
            .map_err(PipelineError::Listing)?;

        let known: Vec<String> = self
            .store
            .snapshot()
            .into_iter()
            .filter_map(|it| it.remote_id)
            .collect();

        let mut added = 0;
        for receipt in receipts {
            if known.contains(&receipt.id) {
                continue;
            }
            let item =
                QueueItem::from_listing(receipt.id, receipt.original_filename, receipt.created_at);
            if self.store.enqueue(item).is_ok() {
                added += 1;
            }
        }
        info!(added, "queue seeded from upload listing");
        Ok(added)
    }
}

async fn run_services(
    gateway: Arc<dyn VideoGateway>,
    upload_id: &str,
    services: ServiceSelection,
    deadline: Duration,
) -> Result<(Option<Value>, Option<Value>), PipelineError> {
    match (services.player_tracking, services.crowd_analysis) {
        (true, true) => {
            let (player, crowd) = tokio::try_join!(
                run_player(gateway.as_ref(), upload_id, deadline),
                run_crowd(gateway.as_ref(), upload_id, deadline),
            )?;
            Ok((Some(player), Some(crowd)))
        }
        (true, false) => Ok((
            Some(run_player(gateway.as_ref(), upload_id, deadline).await?),
            None,
        )),
        (false, true) => Ok((
            None,
            Some(run_crowd(gateway.as_ref(), upload_id, deadline).await?),
        )),
        (false, false) => Ok((None, None)),
    }
}

async fn run_player(
    gateway: &dyn VideoGateway,
    upload_id: &str,
    deadline: Duration,
) -> Result<Value, PipelineError> {
    match tokio::time::timeout(deadline, gateway.run_player_tracking(upload_id)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(PipelineError::Inference {
            service: InferenceService::PlayerTracking,
            source,
        }),
        Err(_) => Err(PipelineError::InferenceTimeout {
            service: InferenceService::PlayerTracking,
            secs: deadline.as_secs(),
        }),
    }
}

async fn run_crowd(
    gateway: &dyn VideoGateway,
    upload_id: &str,
    deadline: Duration,
) -> Result<Value, PipelineError> {
    match tokio::time::timeout(deadline, gateway.run_crowd_analysis(upload_id)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(PipelineError::Inference {
            service: InferenceService::CrowdAnalysis,
            source,
        }),
        Err(_) => Err(PipelineError::InferenceTimeout {
            service: InferenceService::CrowdAnalysis,
            secs: deadline.as_secs(),
        }),
    }
}
