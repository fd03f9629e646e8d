use std::path::PathBuf;

use thiserror::Error;

/// Stream-level failures. Row-level defects never surface here.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to open input {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read input: {0}")]
    Read(#[source] csv::Error),

    #[error("failed to write output: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush output: {0}")]
    Flush(#[from] std::io::Error),
}
