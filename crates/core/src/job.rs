//! Job lifecycle state machine.
//!
//! ```text
//! queued -> processing -> done
//!                     \-> failed
//! ```
//!
//! `queued` is the only initial state, `done` and `failed` are terminal, and no
//! state is ever re-entered.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Metrics reported by a successful job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetrics {
    /// Wall-clock time spent aggregating and writing the artifact.
    pub processing_time_ms: u64,
    /// Number of distinct group keys in the result.
    pub department_count: usize,
}

/// Current lifecycle state of a job, serialized verbatim to status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    Done {
        #[serde(rename = "fileName")]
        file_name: String,
        metrics: JobMetrics,
        #[serde(rename = "downloadUrl", default, skip_serializing_if = "Option::is_none")]
        download_url: Option<String>,
    },
    Failed {
        error: String,
    },
}

impl JobState {
    pub fn done(file_name: impl Into<String>, metrics: JobMetrics, download_url: Option<String>) -> Self {
        Self::Done {
            file_name: file_name.into(),
            metrics,
            download_url,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed { error: error.into() }
    }

    /// Stable lowercase name of the state (matches the serialized `status` tag).
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Done { .. } => "done",
            JobState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done { .. } | JobState::Failed { .. })
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: &JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Processing)
                | (JobState::Processing, JobState::Done { .. })
                | (JobState::Processing, JobState::Failed { .. })
        )
    }

    /// Move to `next`, rejecting anything the state machine does not allow.
    ///
    /// On error `self` is left untouched, so a terminal state can never revert.
    pub fn transition(&mut self, next: JobState) -> DomainResult<()> {
        if !self.can_transition_to(&next) {
            return Err(DomainError::invalid_transition(self.name(), next.name()));
        }
        *self = next;
        Ok(())
    }
}
