//! Job registry implementations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;

use tally_core::{DomainError, JobId, JobState};

use super::types::JobRecord;

/// Job registry abstraction.
///
/// Exactly one executor writes a given job's entry; any number of readers may
/// look at it concurrently.
pub trait JobRegistry: Send + Sync {
    /// Register a new job in the `queued` state.
    fn register(&self, job_id: JobId) -> Result<(), RegistryError>;

    /// Current state of a job, `None` if the id was never registered.
    fn get(&self, job_id: JobId) -> Result<Option<JobState>, RegistryError>;

    /// Full record of a job, including timestamps.
    fn record(&self, job_id: JobId) -> Result<Option<JobRecord>, RegistryError>;

    /// Apply a state machine transition atomically.
    fn transition(&self, job_id: JobId, next: JobState) -> Result<(), RegistryError>;

    /// Job counts per state.
    fn stats(&self) -> Result<JobStats, RegistryError>;
}

/// Registry error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("job {job_id}: {source}")]
    Transition {
        job_id: JobId,
        #[source]
        source: DomainError,
    },
    #[error("registry lock poisoned")]
    Poisoned,
}

/// Job statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobStats {
    pub queued: usize,
    pub processing: usize,
    pub done: usize,
    pub failed: usize,
}

/// In-memory registry.
///
/// The outer lock only guards membership; each entry has its own lock so
/// transitions on one job never contend with another.
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<JobRecord>>>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn entry(&self, job_id: JobId) -> Result<Option<Arc<Mutex<JobRecord>>>, RegistryError> {
        let jobs = self.jobs.read().map_err(|_| RegistryError::Poisoned)?;
        Ok(jobs.get(&job_id).cloned())
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn register(&self, job_id: JobId) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.write().map_err(|_| RegistryError::Poisoned)?;
        if jobs.contains_key(&job_id) {
            return Err(RegistryError::AlreadyExists(job_id));
        }
        jobs.insert(job_id, Arc::new(Mutex::new(JobRecord::queued(job_id))));
        Ok(())
    }

    fn get(&self, job_id: JobId) -> Result<Option<JobState>, RegistryError> {
        Ok(self.record(job_id)?.map(|r| r.state))
    }

    fn record(&self, job_id: JobId) -> Result<Option<JobRecord>, RegistryError> {
        let Some(entry) = self.entry(job_id)? else {
            return Ok(None);
        };
        let record = entry.lock().map_err(|_| RegistryError::Poisoned)?;
        Ok(Some(record.clone()))
    }

    fn transition(&self, job_id: JobId, next: JobState) -> Result<(), RegistryError> {
        let entry = self.entry(job_id)?.ok_or(RegistryError::NotFound(job_id))?;
        let mut record = entry.lock().map_err(|_| RegistryError::Poisoned)?;
        record
            .state
            .transition(next)
            .map_err(|source| RegistryError::Transition { job_id, source })?;
        record.updated_at = Utc::now();
        Ok(())
    }

    fn stats(&self) -> Result<JobStats, RegistryError> {
        let entries: Vec<_> = {
            let jobs = self.jobs.read().map_err(|_| RegistryError::Poisoned)?;
            jobs.values().cloned().collect()
        };

        let mut stats = JobStats::default();
        for entry in entries {
            let record = entry.lock().map_err(|_| RegistryError::Poisoned)?;
            match record.state {
                JobState::Queued => stats.queued += 1,
                JobState::Processing => stats.processing += 1,
                JobState::Done { .. } => stats.done += 1,
                JobState::Failed { .. } => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}
