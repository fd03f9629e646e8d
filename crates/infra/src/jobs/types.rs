//! Job records and the messages exchanged with workers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tally_core::{JobId, JobMetrics, JobState};
use tally_processing::HeaderPolicy;

/// A registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A freshly submitted job, always `queued`.
    pub fn queued(id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Queued,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Everything a worker needs; owned, so nothing is shared with the submitter.
#[derive(Debug, Clone)]
pub struct WorkerInput {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub header_policy: HeaderPolicy,
}

/// What a worker produces on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub file_name: String,
    pub metrics: JobMetrics,
}

/// Outcome notifications flowing from a worker (or its supervisor) to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerSignal {
    /// The worker wrote its artifact.
    Completed { file_name: String, metrics: JobMetrics },
    /// The worker caught an error and reported it.
    Failed { error: String },
    /// The worker went away; may arrive after an explicit signal and is then ignored.
    Exited { reason: String },
}

impl WorkerSignal {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerSignal::Completed { .. } => "completed",
            WorkerSignal::Failed { .. } => "failed",
            WorkerSignal::Exited { .. } => "exited",
        }
    }
}

impl From<WorkerReport> for WorkerSignal {
    fn from(report: WorkerReport) -> Self {
        WorkerSignal::Completed {
            file_name: report.file_name,
            metrics: report.metrics,
        }
    }
}
