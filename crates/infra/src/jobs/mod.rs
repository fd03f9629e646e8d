//! Asynchronous job system.
//!
//! ## Design
//!
//! - One isolated worker per job, run on the blocking pool so aggregation never
//!   stalls request handling
//! - Workers talk to the executor only through [`WorkerSignal`] messages
//! - The registry is the single source of truth for job state; the first
//!   terminal transition wins and later signals are discarded
//! - No retries, no cancellation, no eviction
//!
//! ## Components
//!
//! - `JobRegistry`: in-memory job id -> state mapping
//! - `JobExecutor`: submits jobs, supervises workers, reconciles outcomes
//! - `worker`: the default worker body (aggregate input, write artifact)

pub mod executor;
pub mod registry;
pub mod types;
pub mod worker;

pub use executor::{DEFAULT_LINK_TTL_SECS, ExecutorError, JobExecutor, JobExecutorConfig, WorkerFn};
pub use registry::{InMemoryJobRegistry, JobRegistry, JobStats, RegistryError};
pub use types::{JobRecord, WorkerInput, WorkerReport, WorkerSignal};
pub use worker::{WorkerError, aggregate_to_artifact};
