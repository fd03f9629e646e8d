use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tally_infra::jobs::{ExecutorError, RegistryError};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn registry_error_to_response(err: RegistryError) -> axum::response::Response {
    match err {
        RegistryError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", "job not found"),
        other => {
            tracing::error!(error = %other, "job registry failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "registry_error", other.to_string())
        }
    }
}

pub fn executor_error_to_response(err: ExecutorError) -> axum::response::Response {
    match err {
        ExecutorError::Registry(e) => registry_error_to_response(e),
        ExecutorError::NoRuntime => {
            tracing::error!("job executor has no runtime");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "executor_error", "unable to start job")
        }
    }
}

pub fn unauthorized(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}
