//! Progress-driver strategy for the ambient ticker.
//!
//! The ticker never rolls dice itself; it asks the driver, so tests can swap
//! in a deterministic implementation.

use queue::{stage, AnalysisKind, QueueItem};
use rand::Rng;

pub trait ProgressDriver: Send + Sync {
    /// Progress points to add to `item` this tick.
    fn next_increment(&self, item: &QueueItem) -> u8;

    /// Whether a probability-gated stage transition fires this tick.
    fn should_advance_stage(&self, item: &QueueItem) -> bool;

    /// A failure reason to inject this tick, if any.
    fn inject_failure(&self, item: &QueueItem) -> Option<&'static str>;
}

/// Randomized driver that makes a demo queue feel alive.
///
/// Large files and heavyweight analysis kinds crawl; items that already went
/// through a retry are given an easier time.
#[derive(Debug, Default)]
pub struct SimulatedDriver;

impl SimulatedDriver {
    pub fn new() -> Self {
        Self
    }

    fn size_factor(item: &QueueItem) -> f64 {
        const MB: u64 = 1024 * 1024;
        if item.size_bytes >= 300 * MB {
            0.5
        } else if item.size_bytes >= 100 * MB {
            0.75
        } else {
            1.0
        }
    }

    fn kind_factor(kind: AnalysisKind) -> f64 {
        match kind {
            AnalysisKind::PlayerTracking | AnalysisKind::CrowdAnalysis => 0.6,
            AnalysisKind::TacticalAnalysis => 0.7,
            AnalysisKind::PerformanceAnalysis => 0.85,
            AnalysisKind::HighlightGeneration => 1.0,
        }
    }
}

impl ProgressDriver for SimulatedDriver {
    fn next_increment(&self, item: &QueueItem) -> u8 {
        let base: f64 = rand::thread_rng().gen_range(3.0..=12.0);
        let scaled = base * Self::size_factor(item) * Self::kind_factor(item.kind);
        (scaled.round() as u8).max(1)
    }

    fn should_advance_stage(&self, _item: &QueueItem) -> bool {
        rand::thread_rng().gen_bool(0.3)
    }

    fn inject_failure(&self, item: &QueueItem) -> Option<&'static str> {
        let mut rate = 0.02 * (2.0 - Self::size_factor(item)) * (2.0 - Self::kind_factor(item.kind));
        if item.retry_count > 0 {
            rate *= 0.4;
        }
        let mut rng = rand::thread_rng();
        if rng.gen_bool(rate.clamp(0.0, 1.0)) {
            let reason = stage::reason::ALL[rng.gen_range(0..stage::reason::ALL.len())];
            Some(reason)
        } else {
            None
        }
    }
}

/// Deterministic driver for tests and scripted demos.
#[derive(Debug, Clone, Copy)]
pub struct FixedDriver {
    pub increment: u8,
    pub advance_stage: bool,
    pub failure: Option<&'static str>,
}

impl FixedDriver {
    pub fn steady(increment: u8) -> Self {
        Self {
            increment,
            advance_stage: true,
            failure: None,
        }
    }

    pub fn failing(reason: &'static str) -> Self {
        Self {
            increment: 5,
            advance_stage: true,
            failure: Some(reason),
        }
    }
}

impl ProgressDriver for FixedDriver {
    fn next_increment(&self, _item: &QueueItem) -> u8 {
        self.increment
    }

    fn should_advance_stage(&self, _item: &QueueItem) -> bool {
        self.advance_stage
    }

    fn inject_failure(&self, _item: &QueueItem) -> Option<&'static str> {
        self.failure
    }
}
