use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

pub mod jobs;
pub mod system;

/// Routes guarded by the API key when one is configured.
pub fn guarded() -> Router {
    Router::new()
        .route(
            "/upload",
            post(jobs::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/status/:job_id", get(jobs::status))
}

/// Routes that do their own authorization (or need none).
pub fn open() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/download/:file_name", get(jobs::download))
}
