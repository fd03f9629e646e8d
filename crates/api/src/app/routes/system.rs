use axum::{
    Json,
    extract::Extension,
    response::{IntoResponse, Response},
};

use tally_infra::jobs::JobRegistry;

use crate::app::{dto::HealthResponse, errors, services::SharedServices};

/// Liveness plus a count of jobs per state.
pub async fn health(Extension(services): Extension<SharedServices>) -> Response {
    match services.executor.registry().stats() {
        Ok(jobs) => Json(HealthResponse { status: "ok", jobs }).into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}
