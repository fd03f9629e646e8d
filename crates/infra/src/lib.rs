//! Infrastructure layer: job registry, worker execution, artifact storage.

pub mod jobs;
