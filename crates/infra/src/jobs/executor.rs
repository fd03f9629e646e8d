//! Job executor: one isolated worker per job, outcomes reconciled into the registry.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use tally_auth::LinkSigner;
use tally_core::{JobId, JobState};
use tally_processing::HeaderPolicy;

use super::registry::{JobRegistry, RegistryError};
use super::types::{WorkerInput, WorkerReport, WorkerSignal};
use super::worker::{WorkerError, aggregate_to_artifact};

/// Worker body type.
pub type WorkerFn = Arc<dyn Fn(&WorkerInput) -> Result<WorkerReport, WorkerError> + Send + Sync>;

/// Default lifetime of download links handed out for finished jobs.
pub const DEFAULT_LINK_TTL_SECS: u64 = 3600;

/// Job executor configuration.
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// Where workers write artifacts
    pub output_dir: PathBuf,
    /// Lifetime of issued download links
    pub link_ttl_secs: u64,
    /// How workers interpret the first input row
    pub header_policy: HeaderPolicy,
    /// Name for logging
    pub name: String,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            link_ttl_secs: DEFAULT_LINK_TTL_SECS,
            header_policy: HeaderPolicy::Detect,
            name: "job-executor".to_string(),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_link_ttl(mut self, secs: u64) -> Self {
        self.link_ttl_secs = secs;
        self
    }

    pub fn with_header_policy(mut self, policy: HeaderPolicy) -> Self {
        self.header_policy = policy;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Executor error.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("no async runtime available to supervise workers")]
    NoRuntime,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Launches and supervises workers.
///
/// `submit` returns as soon as the worker is spawned. Each worker runs on the
/// blocking pool and only reports back through [`WorkerSignal`]s; a supervisor
/// task applies them to the registry. Once a job is terminal every further
/// signal for it is dropped.
pub struct JobExecutor<R: JobRegistry> {
    registry: Arc<R>,
    signer: Arc<LinkSigner>,
    config: Arc<JobExecutorConfig>,
    worker: WorkerFn,
}

impl<R: JobRegistry> Clone for JobExecutor<R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            signer: self.signer.clone(),
            config: self.config.clone(),
            worker: self.worker.clone(),
        }
    }
}

impl<R: JobRegistry + 'static> JobExecutor<R> {
    /// Create an executor running the default aggregation worker.
    pub fn new(registry: Arc<R>, signer: LinkSigner, config: JobExecutorConfig) -> Self {
        Self {
            registry,
            signer: Arc::new(signer),
            config: Arc::new(config),
            worker: Arc::new(aggregate_to_artifact),
        }
    }

    /// Replace the worker body.
    pub fn with_worker<F>(mut self, worker: F) -> Self
    where
        F: Fn(&WorkerInput) -> Result<WorkerReport, WorkerError> + Send + Sync + 'static,
    {
        self.worker = Arc::new(worker);
        self
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub fn config(&self) -> &JobExecutorConfig {
        &self.config
    }

    /// Register a job for `input` and start its worker. Never waits for the work.
    pub fn submit(&self, input: impl Into<PathBuf>) -> Result<JobId, ExecutorError> {
        let runtime = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;

        let job_id = JobId::new();
        self.registry.register(job_id)?;
        self.registry.transition(job_id, JobState::Processing)?;

        let worker_input = WorkerInput {
            input: input.into(),
            output_dir: self.config.output_dir.clone(),
            header_policy: self.config.header_policy,
        };
        info!(
            executor = %self.config.name,
            job_id = %job_id,
            input = %worker_input.input.display(),
            "job submitted"
        );

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let worker = self.worker.clone();
        let join = runtime.spawn_blocking(move || run_worker(worker, worker_input, signals_tx));
        runtime.spawn(self.clone().supervise(job_id, join, signals_rx));

        Ok(job_id)
    }

    /// Apply a worker signal to the job's state. Returns whether it changed anything.
    pub fn reconcile(&self, job_id: JobId, signal: WorkerSignal) -> bool {
        let kind = signal.kind();
        let next = match signal {
            WorkerSignal::Completed { file_name, metrics } => {
                let url = self.signer.issue(&file_name, self.config.link_ttl_secs);
                JobState::done(file_name, metrics, Some(url))
            }
            WorkerSignal::Failed { error } => JobState::failed(error),
            WorkerSignal::Exited { reason } => {
                JobState::failed(format!("worker terminated unexpectedly: {reason}"))
            }
        };
        let next_name = next.name();

        match self.registry.transition(job_id, next) {
            Ok(()) => {
                info!(
                    executor = %self.config.name,
                    job_id = %job_id,
                    signal = kind,
                    state = next_name,
                    "job state changed"
                );
                true
            }
            Err(RegistryError::Transition { source, .. }) => {
                debug!(
                    executor = %self.config.name,
                    job_id = %job_id,
                    signal = kind,
                    reason = %source,
                    "ignoring late worker signal"
                );
                false
            }
            Err(e) => {
                error!(executor = %self.config.name, job_id = %job_id, error = %e, "failed to record job outcome");
                false
            }
        }
    }

    async fn supervise(
        self,
        job_id: JobId,
        join: JoinHandle<()>,
        mut signals: mpsc::UnboundedReceiver<WorkerSignal>,
    ) {
        let exit = join.await;

        // The sender lives inside the worker closure, so the channel is closed
        // once the worker has finished or unwound.
        while let Some(signal) = signals.recv().await {
            self.reconcile(job_id, signal);
        }

        let reason = match exit {
            Ok(()) => "worker exited without reporting an outcome".to_string(),
            Err(e) => {
                let reason = describe_join_error(e);
                warn!(executor = %self.config.name, job_id = %job_id, reason = %reason, "worker died");
                reason
            }
        };
        self.reconcile(job_id, WorkerSignal::Exited { reason });
    }
}

fn run_worker(worker: WorkerFn, input: WorkerInput, signals: mpsc::UnboundedSender<WorkerSignal>) {
    let signal = match worker(&input) {
        Ok(report) => WorkerSignal::from(report),
        Err(e) => WorkerSignal::Failed {
            error: e.to_string(),
        },
    };
    // The supervisor only stops listening after this thread has exited.
    let _ = signals.send(signal);
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        return "worker was cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => format!("worker panicked: {}", panic_message(payload.as_ref())),
        Err(err) => err.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
