//! Ambient progress ticker.
//!
//! Periodically advances items that are not driven by the interactive
//! workflow, so a queue resumed from a server listing still moves. The one
//! rule that must hold everywhere: items with `ui_controlled` set are never
//! touched, and terminal items only change again through an explicit retry.

use crate::driver::ProgressDriver;
use crate::orchestrator::AnalysisEvent;
use crossbeam_channel::Sender;
use queue::{stage, ItemStatus, QueueStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct AmbientTicker {
    store: QueueStore,
    driver: Arc<dyn ProgressDriver>,
    interval: Duration,
    tx_events: Option<Sender<AnalysisEvent>>,
}

impl AmbientTicker {
    pub fn new(store: QueueStore, driver: Arc<dyn ProgressDriver>, interval: Duration) -> Self {
        Self {
            store,
            driver,
            interval,
            tx_events: None,
        }
    }

    pub fn with_events(mut self, tx: Sender<AnalysisEvent>) -> Self {
        self.tx_events = Some(tx);
        self
    }

    /// One pass over the queue. All per-item decisions run inside the store
    /// update so they see the item state at application time.
    pub fn tick(&self) {
        let mut events = Vec::new();

        for snapshot in self.store.snapshot() {
            if snapshot.ui_controlled || snapshot.status.is_terminal() {
                continue;
            }
            let driver = self.driver.as_ref();
            self.store.update(&snapshot.id, |item| {
                if item.ui_controlled || item.status.is_terminal() {
                    return;
                }

                // Failure injection, capped after two strikes.
                if item.error_count < 2 && item.progress > 10 {
                    if let Some(reason) = driver.inject_failure(item) {
                        item.fail(reason);
                        events.push(AnalysisEvent::Failed {
                            id: item.id.clone(),
                            reason: reason.to_string(),
                        });
                        return;
                    }
                }

                let before = item.status;
                match item.status {
                    ItemStatus::Uploading => {
                        let next = item.progress.saturating_add(driver.next_increment(item));
                        if next >= 100 {
                            item.status = ItemStatus::Queued;
                            item.progress = 0;
                            item.processing_stage = stage::QUEUE_WAITING.to_string();
                        } else {
                            item.advance_progress(next);
                        }
                    }
                    ItemStatus::Queued => {
                        if driver.should_advance_stage(item) {
                            item.status = ItemStatus::Processing;
                            item.processing_stage = stage::PREPROCESSING.to_string();
                        }
                    }
                    ItemStatus::Processing => {
                        let next = item.progress.saturating_add(driver.next_increment(item));
                        if next >= 100 {
                            item.complete();
                        } else {
                            item.advance_progress(next);
                            if item.progress > 30 && driver.should_advance_stage(item) {
                                item.status = ItemStatus::Analyzing;
                                item.processing_stage = stage::VIDEO_ANALYSIS.to_string();
                            }
                        }
                    }
                    ItemStatus::Analyzing => {
                        let next = item.progress.saturating_add(driver.next_increment(item));
                        if next >= 100 {
                            item.complete();
                        } else {
                            item.advance_progress(next);
                        }
                    }
                    ItemStatus::Completed | ItemStatus::Failed => {}
                }

                if item.status != before {
                    events.push(if item.status == ItemStatus::Completed {
                        AnalysisEvent::Completed {
                            id: item.id.clone(),
                        }
                    } else {
                        AnalysisEvent::StatusChanged {
                            id: item.id.clone(),
                            status: item.status,
                        }
                    });
                }
            });
        }

        if let Some(tx) = &self.tx_events {
            for event in events {
                let _ = tx.send(event);
            }
        }
    }

    /// Run forever at the configured interval.
    pub async fn run(self) {
        debug!(interval_secs = self.interval.as_secs(), "ambient ticker started");
        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FixedDriver;
    use queue::{AnalysisKind, QueueItem};

    fn ambient_item(name: &str, status: ItemStatus, progress: u8) -> QueueItem {
        let mut item = QueueItem::new(name, AnalysisKind::HighlightGeneration, 50 << 20, 0, false);
        item.status = status;
        item.progress = progress;
        item
    }

    fn ticker(store: &QueueStore, driver: FixedDriver) -> AmbientTicker {
        AmbientTicker::new(store.clone(), Arc::new(driver), Duration::from_secs(2))
    }

    #[test]
    fn never_touches_ui_controlled_items() {
        let store = QueueStore::new();
        let mut owned = QueueItem::new("mine.mp4", AnalysisKind::PlayerTracking, 10 << 20, 2, true);
        owned.status = ItemStatus::Analyzing;
        owned.progress = 40;
        let owned_id = owned.id.clone();
        let before = owned.clone();
        store.enqueue(owned).unwrap();
        store
            .enqueue(ambient_item("ambient.mp4", ItemStatus::Processing, 40))
            .unwrap();

        let ticker = ticker(&store, FixedDriver::steady(10));
        for _ in 0..25 {
            ticker.tick();
        }

        assert_eq!(store.get(&owned_id).unwrap(), before);
    }

    #[test]
    fn upload_completion_resets_into_queued() {
        let store = QueueStore::new();
        let item = ambient_item("a.mp4", ItemStatus::Uploading, 95);
        let id = item.id.clone();
        store.enqueue(item).unwrap();

        ticker(&store, FixedDriver::steady(10)).tick();

        let it = store.get(&id).unwrap();
        assert_eq!(it.status, ItemStatus::Queued);
        assert_eq!(it.progress, 0);
        assert_eq!(it.processing_stage, stage::QUEUE_WAITING);
    }

    #[test]
    fn queued_items_advance_when_the_gate_fires() {
        let store = QueueStore::new();
        let item = ambient_item("a.mp4", ItemStatus::Queued, 0);
        let id = item.id.clone();
        store.enqueue(item).unwrap();

        ticker(&store, FixedDriver::steady(10)).tick();
        assert_eq!(store.get(&id).unwrap().status, ItemStatus::Processing);

        let held = FixedDriver {
            increment: 10,
            advance_stage: false,
            failure: None,
        };
        let store2 = QueueStore::new();
        let item = ambient_item("b.mp4", ItemStatus::Queued, 0);
        let id2 = item.id.clone();
        store2.enqueue(item).unwrap();
        ticker(&store2, held).tick();
        assert_eq!(store2.get(&id2).unwrap().status, ItemStatus::Queued);
    }

    #[test]
    fn any_state_reaching_full_progress_completes() {
        let store = QueueStore::new();
        let processing = ambient_item("p.mp4", ItemStatus::Processing, 96);
        let analyzing = ambient_item("a.mp4", ItemStatus::Analyzing, 96);
        let ids = [processing.id.clone(), analyzing.id.clone()];
        store.enqueue(processing).unwrap();
        store.enqueue(analyzing).unwrap();

        ticker(&store, FixedDriver::steady(10)).tick();

        for id in ids {
            let it = store.get(&id).unwrap();
            assert_eq!(it.status, ItemStatus::Completed);
            assert_eq!(it.progress, 100);
            assert!(it.completed_time.is_some());
            assert!(it.estimated_completion.is_none());
        }
    }

    #[test]
    fn statuses_only_move_forward() {
        fn rank(status: ItemStatus) -> u8 {
            match status {
                ItemStatus::Uploading => 0,
                ItemStatus::Queued => 1,
                ItemStatus::Processing => 2,
                ItemStatus::Analyzing => 3,
                ItemStatus::Completed | ItemStatus::Failed => 4,
            }
        }

        let store = QueueStore::new();
        for i in 0..4 {
            store
                .enqueue(ambient_item(&format!("v{i}.mp4"), ItemStatus::Uploading, 0))
                .unwrap();
        }
        let ticker = ticker(&store, FixedDriver::steady(9));

        let mut last: std::collections::HashMap<String, ItemStatus> = store
            .snapshot()
            .into_iter()
            .map(|it| (it.id, it.status))
            .collect();

        for _ in 0..80 {
            ticker.tick();
            for it in store.snapshot() {
                let prev = last.insert(it.id.clone(), it.status).unwrap();
                assert!(
                    rank(it.status) >= rank(prev),
                    "{} went {prev:?} -> {:?}",
                    it.name,
                    it.status
                );
            }
        }
    }

    #[test]
    fn failure_injection_respects_the_error_cap() {
        let store = QueueStore::new();
        let mut item = ambient_item("a.mp4", ItemStatus::Processing, 50);
        item.error_count = 2;
        let id = item.id.clone();
        store.enqueue(item).unwrap();

        ticker(&store, FixedDriver::failing(stage::reason::SERVER_OVERLOAD)).tick();

        // Capped at two strikes: keeps processing instead of failing again.
        let it = store.get(&id).unwrap();
        assert_ne!(it.status, ItemStatus::Failed);
        assert_eq!(it.error_count, 2);
    }

    #[test]
    fn failure_injection_needs_some_progress_first() {
        let store = QueueStore::new();
        let fresh = ambient_item("a.mp4", ItemStatus::Processing, 5);
        let far = ambient_item("b.mp4", ItemStatus::Processing, 50);
        let fresh_id = fresh.id.clone();
        let far_id = far.id.clone();
        store.enqueue(fresh).unwrap();
        store.enqueue(far).unwrap();

        ticker(&store, FixedDriver::failing(stage::reason::UNSUPPORTED_CODEC)).tick();

        assert_ne!(store.get(&fresh_id).unwrap().status, ItemStatus::Failed);
        let failed = store.get(&far_id).unwrap();
        assert_eq!(failed.status, ItemStatus::Failed);
        assert_eq!(failed.error_count, 1);
        assert_eq!(failed.processing_stage, stage::reason::UNSUPPORTED_CODEC);
    }
}
