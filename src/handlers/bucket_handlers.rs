//! HTTP handlers for bucket operations.

use crate::{
    errors::AppError,
    models::{
        MessageResponse,
        bucket::{BucketsResponse, CreateBucketRequest},
    },
    services::storage_service::{StorageError, StorageService},
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};

/// `GET /buckets` — every bucket name.
pub async fn list_buckets(
    State(service): State<StorageService>,
) -> Result<Json<BucketsResponse>, AppError> {
    let buckets = service
        .list_buckets()
        .await
        .map_err(|err| AppError::internal("Failed to list buckets", &err))?;
    Ok(Json(BucketsResponse { buckets }))
}

/// `POST /buckets` — create a bucket from `{"name": "..."}`.
pub async fn create_bucket(
    State(service): State<StorageService>,
    payload: Result<Json<CreateBucketRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|rejection| {
        debug!("rejected create-bucket body: {}", rejection);
        AppError::bad_request("Invalid request body")
    })?;

    if req.name.is_empty() {
        return Err(AppError::bad_request("Bucket name is required"));
    }
    if !is_valid_bucket_name(&req.name) {
        return Err(AppError::bad_request(
            "Invalid bucket name. Use only letters, numbers, dashes, and underscores.",
        ));
    }

    let created = service
        .create_bucket(&req.name)
        .await
        .map_err(|err| AppError::internal("Failed to create bucket", &err))?;
    if !created {
        return Err(AppError::conflict(format!(
            "Bucket '{}' already exists",
            req.name
        )));
    }

    info!(bucket = %req.name, "bucket created");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!(
            "Bucket '{}' created successfully",
            req.name
        ))),
    ))
}

/// `DELETE /buckets/{bucket}` — delete an empty bucket.
pub async fn delete_bucket(
    State(service): State<StorageService>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(bucket) = path?;
    if bucket.is_empty() {
        return Err(AppError::bad_request("Bucket name is required"));
    }

    service.delete_bucket(&bucket).await.map_err(|err| match err {
        StorageError::BucketNotFound(_) => {
            AppError::not_found(format!("Bucket '{}' not found", bucket))
        }
        StorageError::BucketNotEmpty(_) => AppError::conflict(format!(
            "Cannot delete bucket '{}': bucket is not empty",
            bucket
        )),
        StorageError::InvalidBucketName(_) => AppError::bad_request("Invalid bucket name"),
        other => AppError::internal(format!("Failed to delete bucket '{}'", bucket), &other),
    })?;

    info!(bucket = %bucket, "bucket deleted");
    Ok(Json(MessageResponse::new(format!(
        "Bucket '{}' deleted successfully",
        bucket
    ))))
}

/// Bucket names created through the API are restricted to ASCII letters,
/// digits, `-` and `_`. No length limit.
pub fn is_valid_bucket_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_rules() {
        assert!(is_valid_bucket_name("my-bucket_01"));
        assert!(is_valid_bucket_name("UPPER"));
        assert!(is_valid_bucket_name(&"a".repeat(300)));

        for name in ["", "my bucket", "bucket/evil", "bucket.name", "..", "café"] {
            assert!(!is_valid_bucket_name(name), "{name:?} should be invalid");
        }
    }
}
