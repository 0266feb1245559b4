use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressPhase {
    #[default]
    Idle,
    FetchingList,
    FetchingDetails,
    Processing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchDetails {
    pub fetched: u64,
    pub total: u64,
}

/// A point-in-time copy of the progress state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub phase: ProgressPhase,
    pub current_step: u64,
    pub total_steps: u64,
    pub percentage: f64,
    pub message: String,
    pub details: Option<FetchDetails>,
}

/// Progress of one fetch pipeline.
///
/// All updates happen under a single lock, so a reader never observes a half applied update and
/// concurrent completions are never lost. Readers get copies through [`ProgressPublisher::snapshot`].
#[derive(Debug, Default)]
pub struct ProgressPublisher {
    state: Mutex<ProgressSnapshot>,
}

fn percentage(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.;
    }
    let p = (current as f64 / total as f64) * 100.;
    (p * 100.).round() / 100.
}

impl ProgressPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        // The state is plain data; a panic in another holder cannot leave it inconsistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = ProgressSnapshot::default();
    }

    /// Enter a phase that is not counted step by step.
    pub fn set_phase(&self, phase: ProgressPhase, message: impl Into<String>) {
        let mut state = self.lock();
        state.phase = phase;
        state.message = message.into();
        debug!(phase = ?phase, message = %state.message, "Progress phase changed");
    }

    /// Replace the status message without touching the counters.
    pub fn set_message(&self, message: impl Into<String>) {
        self.lock().message = message.into();
    }

    /// Enter the detail fetching phase with `total` items outstanding.
    pub fn begin_details(&self, total: u64, message: impl Into<String>) {
        let mut state = self.lock();
        state.phase = ProgressPhase::FetchingDetails;
        state.current_step = 0;
        state.total_steps = total;
        state.percentage = percentage(0, total);
        state.message = message.into();
        state.details = Some(FetchDetails { fetched: 0, total });
    }

    /// Record one finished item and return the state as of that completion.
    ///
    /// The counter never exceeds the total established by `begin_details`.
    pub fn record_fetched(&self) -> ProgressSnapshot {
        let mut state = self.lock();
        let total = state.total_steps;
        state.current_step = (state.current_step + 1).min(total);
        state.percentage = percentage(state.current_step, total);
        state.details = Some(FetchDetails {
            fetched: state.current_step,
            total,
        });
        state.clone()
    }

    /// Mark the pipeline finished. Counters are left as they are.
    pub fn complete(&self, message: impl Into<String>) {
        let mut state = self.lock();
        state.phase = ProgressPhase::Complete;
        state.percentage = 100.;
        state.message = message.into();
    }
}
