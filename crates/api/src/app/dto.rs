use serde::{Deserialize, Serialize};

use tally_infra::jobs::JobStats;

// -------------------------
// Request DTOs
// -------------------------

/// Query string accepted by the download route.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    pub token: Option<String>,
    pub expires: Option<String>,
    pub api_key: Option<String>,
}

/// Only the `apiKey` part of a query string; used by the API key guard.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyQuery {
    pub api_key: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub job_id: String,
    pub status_url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub jobs: JobStats,
}
