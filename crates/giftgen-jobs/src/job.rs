//! Lifecycle of a submitted video job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

use giftgen_providers::VendorStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    InProgress,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Submitted | Self::InProgress)
    }
}

/// A job known to the vendor. Lives only as long as the polling loop that owns it.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub request_id: String,
    pub submitted_at: DateTime<Utc>,
    state: JobState,
    started: Instant,
    polls: u32,
}

impl GenerationJob {
    pub fn submitted(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            submitted_at: Utc::now(),
            state: JobState::Submitted,
            started: Instant::now(),
            polls: 0,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Status reads so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Apply a vendor status read. Terminal states are final.
    pub fn observe(&mut self, status: &VendorStatus) -> JobState {
        self.polls += 1;
        if self.state.is_terminal() {
            warn!(
                request_id = %self.request_id,
                state = ?self.state,
                ?status,
                "Status read after job reached a terminal state"
            );
            return self.state;
        }
        self.state = match status {
            VendorStatus::InQueue { .. } => self.state,
            VendorStatus::InProgress => JobState::InProgress,
            VendorStatus::Completed => JobState::Completed,
            VendorStatus::Failed { .. } => JobState::Failed,
        };
        self.state
    }

    pub fn time_out(&mut self) {
        self.finish(JobState::TimedOut);
    }

    pub fn cancel(&mut self) {
        self.finish(JobState::Cancelled);
    }

    pub fn fail(&mut self) {
        self.finish(JobState::Failed);
    }

    fn finish(&mut self, state: JobState) {
        if !self.state.is_terminal() {
            self.state = state;
        }
    }
}
