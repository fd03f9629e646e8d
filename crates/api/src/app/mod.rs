//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the job executor, link signer and directories shared by handlers
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, http::StatusCode, response::Response};

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Jobs are executed on the Tokio runtime that serves the router.
pub fn build_app(config: &AppConfig) -> Router {
    let services = Arc::new(services::build_services(config));

    let guarded = routes::guarded().layer(axum::middleware::from_fn_with_state(
        config.api_key.clone(),
        middleware::api_key_middleware,
    ));

    Router::new()
        .merge(guarded)
        .merge(routes::open())
        .fallback(not_found)
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            middleware::CorsState::new(&config.allow_origin),
            middleware::cors_middleware,
        ))
}

async fn not_found() -> Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "no such route")
}
