//! Default worker body: aggregate the uploaded file and write the artifact.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use tally_core::JobMetrics;
use tally_processing::{Aggregator, ProcessingError, encode};

use super::types::{WorkerInput, WorkerReport};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("failed to create artifact {path}: {source}")]
    CreateArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Aggregate `input.input` and write the totals to a fresh `<uuid>.csv` in
/// `input.output_dir`.
///
/// Blocking; meant to run on a dedicated thread. The artifact is created
/// exclusively and removed again if encoding fails part way.
pub fn aggregate_to_artifact(input: &WorkerInput) -> Result<WorkerReport, WorkerError> {
    let started = Instant::now();

    let aggregation = Aggregator::with_policy(input.header_policy).aggregate_path(&input.input)?;

    let file_name = format!("{}.csv", Uuid::new_v4());
    let path = input.output_dir.join(&file_name);
    let file = File::create_new(&path).map_err(|source| WorkerError::CreateArtifact {
        path: path.clone(),
        source,
    })?;

    if let Err(e) = encode(&aggregation.totals, BufWriter::new(file)) {
        if let Err(cleanup) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %cleanup, "failed to remove partial artifact");
        }
        return Err(e.into());
    }

    let metrics = JobMetrics {
        processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        department_count: aggregation.totals.len(),
    };
    debug!(
        file = %file_name,
        rows = aggregation.stats.rows_read,
        skipped = aggregation.stats.rows_skipped,
        "artifact written"
    );

    Ok(WorkerReport { file_name, metrics })
}
