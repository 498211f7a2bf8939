//! Defines routes for all bucket and object operations.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET    /health` — static API description
//!   - `GET    /readyz` — disk readiness probe
//!
//! - **Object-level endpoints**
//!   - `PUT    /upload/{bucket}?key=` — upload (multipart `file` field)
//!   - `GET    /download/{bucket}/{*key}` — download
//!   - `GET    /list/{bucket}` — list files in a bucket
//!   - `DELETE /delete/{bucket}/{*key}` — delete
//!
//! - **Bucket-level endpoints**
//!   - `GET    /buckets` — list buckets
//!   - `POST   /buckets` — create bucket
//!   - `DELETE /buckets/{bucket}` — delete empty bucket
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.
//! Anything else falls through to the static asset directory.

use crate::{
    config::AppConfig,
    handlers::{
        bucket_handlers::{create_bucket, delete_bucket, list_buckets},
        health_handlers::{health, readyz},
        object_handlers::{delete_object, download_object, list_objects, upload_object},
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    routing::{delete, get, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Build the API router.
///
/// The router carries shared state (`StorageService`) to all handlers.
/// `max_upload_bytes` bounds the request body of the upload route only.
pub fn routes(max_upload_bytes: usize) -> Router<StorageService> {
    Router::new()
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        // Object-level routes
        .route(
            "/upload/{bucket}",
            put(upload_object).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/download/{bucket}/{*key}", get(download_object))
        .route("/list/{bucket}", get(list_objects))
        .route("/delete/{bucket}/{*key}", delete(delete_object))
        // Bucket-level routes
        .route("/buckets", get(list_buckets).post(create_bucket))
        .route("/buckets/{bucket}", delete(delete_bucket))
}

/// Permissive CORS: any origin and header, no credentials.
pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

/// Compose the full application: API routes, static fallback, CORS and
/// request tracing.
pub fn app(storage: StorageService, cfg: &AppConfig) -> Router {
    routes(cfg.max_upload_bytes)
        .fallback_service(ServeDir::new(&cfg.public_dir))
        .with_state(storage)
        .layer(cors())
        .layer(TraceLayer::new_for_http())
}
