//! Upload, status and download endpoints.

use std::io::ErrorKind;
use std::path::{Path as FsPath, PathBuf};

use axum::{
    Json,
    extract::{Extension, Multipart, Path, Query, multipart::MultipartRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tokio::io::AsyncWriteExt;

use tally_core::JobId;
use tally_infra::jobs::JobRegistry;

use crate::app::{
    dto::{DownloadQuery, UploadResponse},
    errors::{self, json_error},
    services::SharedServices,
};
use crate::middleware::provided_api_key;

/// Multipart field carrying the uploaded CSV.
pub const UPLOAD_FIELD: &str = "file";

const FALLBACK_UPLOAD_NAME: &str = "upload.csv";

/// `POST /upload`: store the file, start a job and hand back where to poll.
pub async fn upload(
    Extension(services): Extension<SharedServices>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let no_file = || {
        json_error(
            StatusCode::BAD_REQUEST,
            "no_file",
            format!("file is required under field `{UPLOAD_FIELD}`"),
        )
    };

    let Ok(mut multipart) = multipart else {
        return no_file();
    };

    let stored = loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return no_file(),
            Err(e) => {
                return json_error(StatusCode::BAD_REQUEST, "invalid_multipart", e.body_text());
            }
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        match store_upload(&services.upload_dir, field).await {
            Ok(path) => break path,
            Err(resp) => return resp,
        }
    };

    let job_id = match services.executor.submit(&stored) {
        Ok(job_id) => job_id,
        Err(e) => return errors::executor_error_to_response(e),
    };

    Json(UploadResponse {
        job_id: job_id.to_string(),
        status_url: format!("/status/{job_id}"),
    })
    .into_response()
}

/// Stream one multipart field to `upload_dir/<millis>-<basename>`.
async fn store_upload(
    upload_dir: &FsPath,
    mut field: axum::extract::multipart::Field<'_>,
) -> Result<PathBuf, Response> {
    let basename = upload_basename(field.file_name());
    let (path, mut file) = create_upload_file(upload_dir, &basename)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, dir = %upload_dir.display(), "failed to create upload file");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "failed to store upload")
        })?;

    let written = async {
        let mut bytes = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(|e| {
            json_error(StatusCode::BAD_REQUEST, "invalid_multipart", e.body_text())
        })? {
            bytes += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|e| {
                tracing::error!(error = %e, path = %path.display(), "failed to write upload");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "failed to store upload")
            })?;
        }
        file.flush().await.map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "failed to flush upload");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "failed to store upload")
        })?;
        Ok::<u64, Response>(bytes)
    }
    .await;

    match written {
        Ok(bytes) => {
            tracing::info!(path = %path.display(), bytes, "upload stored");
            Ok(path)
        }
        Err(resp) => {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(error = %e, path = %path.display(), "failed to remove partial upload");
            }
            Err(resp)
        }
    }
}

async fn create_upload_file(
    upload_dir: &FsPath,
    basename: &str,
) -> std::io::Result<(PathBuf, tokio::fs::File)> {
    let mut millis = Utc::now().timestamp_millis();
    loop {
        let path = upload_dir.join(format!("{millis}-{basename}"));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            // Same name within the same millisecond: take the next free slot.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => millis += 1,
            Err(e) => return Err(e),
        }
    }
}

/// The final path component of a client supplied file name.
fn upload_basename(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_UPLOAD_NAME)
        .to_string()
}

/// `GET /status/{jobId}`.
pub async fn status(
    Extension(services): Extension<SharedServices>,
    Path(job_id): Path<String>,
) -> Response {
    let not_found = || json_error(StatusCode::NOT_FOUND, "not_found", "job not found");

    let Ok(job_id) = job_id.parse::<JobId>() else {
        return not_found();
    };

    match services.executor.registry().get(job_id) {
        Ok(Some(state)) => Json(state).into_response(),
        Ok(None) => not_found(),
        Err(e) => errors::registry_error_to_response(e),
    }
}

/// `GET /download/{fileName}`: signed token first, then the API key fallback.
pub async fn download(
    Extension(services): Extension<SharedServices>,
    Path(file_name): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Response {
    let token_ok = services
        .signer
        .verify(&file_name, query.token.as_deref(), query.expires.as_deref());

    if !token_ok {
        let key_ok = services
            .api_key
            .as_ref()
            .is_some_and(|key| key.matches(provided_api_key(&headers, query.api_key.as_deref())));
        if !key_ok {
            tracing::warn!(file = %file_name, "download rejected: invalid or expired token");
            return errors::unauthorized("Invalid or expired download token");
        }
    }

    let file_not_found = || json_error(StatusCode::NOT_FOUND, "not_found", "file not found");
    if !is_plain_file_name(&file_name) {
        return file_not_found();
    }

    let path = services.output_dir.join(&file_name);
    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => return file_not_found(),
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "failed to read artifact");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "failed to read file");
        }
    };

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// Artifact names are single path components; anything else is never served.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
