//! Health & readiness handlers.
//!
//! - GET /health  -> static description of the API, no I/O
//! - GET /readyz  -> readiness that checks disk I/O under the storage root

use crate::{
    models::health::{CheckStatus, Endpoint, HealthResponse, ReadyResponse},
    services::storage_service::StorageService,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/health", "Service description"),
    ("PUT", "/upload/:bucket?key=", "Upload a file to a bucket"),
    ("GET", "/download/:bucket/:key", "Download a file from a bucket"),
    ("GET", "/list/:bucket", "List all files in a bucket"),
    ("DELETE", "/delete/:bucket/:key", "Delete a file from a bucket"),
    ("GET", "/buckets", "List all buckets"),
    ("POST", "/buckets", "Create a bucket"),
    ("DELETE", "/buckets/:bucket", "Delete an empty bucket"),
];

/// `GET /health`
///
/// Always 200. Never touches storage.
pub async fn health() -> impl IntoResponse {
    let endpoints = ENDPOINTS
        .iter()
        .map(|&(method, path, description)| Endpoint {
            method,
            path,
            description,
        })
        .collect();

    (
        StatusCode::OK,
        Json(HealthResponse {
            message: "Object store API is running".into(),
            endpoints,
        }),
    )
}

/// `GET /readyz`
///
/// Performs a best-effort write/read/delete of a temp file under the storage
/// `base_path`. HTTP 200 when it succeeds, HTTP 503 otherwise.
pub async fn readyz(State(service): State<StorageService>) -> impl IntoResponse {
    let tmp_path = service
        .base_path
        .join(format!(".readyz-{}", Uuid::new_v4()));
    let disk_check = match fs::write(&tmp_path, b"readyz").await {
        Ok(()) => match fs::read(&tmp_path).await {
            Ok(bytes) if bytes == b"readyz" => match fs::remove_file(&tmp_path).await {
                Ok(()) => CheckStatus {
                    ok: true,
                    error: None,
                },
                Err(e) => CheckStatus {
                    ok: true,
                    error: Some(format!("could not remove tmp file: {}", e)),
                },
            },
            Ok(_) => {
                let _ = fs::remove_file(&tmp_path).await;
                CheckStatus {
                    ok: false,
                    error: Some("file content mismatch".to_string()),
                }
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                CheckStatus {
                    ok: false,
                    error: Some(format!("could not read tmp file: {}", e)),
                }
            }
        },
        Err(e) => CheckStatus {
            ok: false,
            error: Some(format!("could not write tmp file: {}", e)),
        },
    };

    let ok = disk_check.ok;
    if !ok {
        tracing::warn!("readiness check failed: {:?}", disk_check.error);
    }

    let mut checks = HashMap::new();
    checks.insert("disk", disk_check);

    let body = ReadyResponse {
        status: if ok { "ok".into() } else { "error".into() },
        checks,
    };
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
