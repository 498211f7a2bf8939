//! HTTP handlers for object operations.
//! Streams object bodies in both directions to avoid buffering in memory and
//! delegates storage concerns to `StorageService`.

use crate::{
    errors::AppError,
    models::{
        MessageResponse,
        bucket::BucketListResponse,
        object::{UploadQuery, UploadResponse},
    },
    services::storage_service::{StorageError, StorageService},
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Query, Request, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use std::io;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info};

const NO_FILE_UPLOADED: &str = "No file uploaded";
const FILE_NOT_FOUND: &str = "File not found";
const FILE_TOO_LARGE: &str = "File too large";

/// `PUT /upload/{bucket}?key=` — store the multipart `file` field.
///
/// The key comes from the query string, falling back to the uploaded filename.
/// A caller-supplied key gets an extension appended when one can be inferred
/// from the part's content type and the key does not already carry it.
///
/// A body over the configured limit is a 413, whether the limit trips while
/// parsing part headers or while the file streams to disk.
pub async fn upload_object(
    State(service): State<StorageService>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(bucket) = path?;
    let Query(query) = query?;
    let mut multipart = multipart.map_err(|rejection| {
        debug!("rejected upload body: {}", rejection);
        AppError::bad_request(NO_FILE_UPLOADED)
    })?;

    let field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => break field,
            Ok(Some(_)) => continue,
            Ok(None) => return Err(AppError::bad_request(NO_FILE_UPLOADED)),
            Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(AppError::payload_too_large(FILE_TOO_LARGE));
            }
            Err(err) => {
                debug!("malformed multipart body: {}", err);
                return Err(AppError::bad_request(NO_FILE_UPLOADED));
            }
        }
    };

    let mimetype = field.content_type().unwrap_or_default().to_string();
    let key = match query.key.filter(|key| !key.is_empty()) {
        Some(key) => with_inferred_extension(key, &mimetype),
        None => field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request(NO_FILE_UPLOADED))?,
    };

    let stream = field.map_err(io::Error::other);
    let size = service
        .save_object(&bucket, &key, stream)
        .await
        .map_err(|err| match err {
            StorageError::InvalidBucketName(_) => AppError::bad_request("Invalid bucket name"),
            StorageError::InvalidObjectKey(_) => AppError::bad_request("Invalid object key"),
            StorageError::Io(err) if exceeded_body_limit(&err) => {
                AppError::payload_too_large(FILE_TOO_LARGE)
            }
            other => AppError::internal("Failed to upload file", &other),
        })?;

    info!(bucket = %bucket, key = %key, size, "object uploaded");

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".into(),
        bucket,
        key,
        size,
        mimetype,
    }))
}

/// `GET /download/{bucket}/{*key}` — stream the object back.
///
/// Content type, length and conditional/range headers are handled by
/// `ServeFile`, which infers the type from the file extension.
pub async fn download_object(
    State(service): State<StorageService>,
    path: Result<Path<(String, String)>, PathRejection>,
    request: Request,
) -> Result<Response, AppError> {
    let Path((bucket, key)) = path?;
    let path = service
        .resolve_object_path(&bucket, &key)
        .await
        .map_err(|err| match err {
            StorageError::ObjectNotFound { .. } => AppError::not_found(FILE_NOT_FOUND),
            StorageError::InvalidBucketName(_) => AppError::bad_request("Invalid bucket name"),
            StorageError::InvalidObjectKey(_) => AppError::bad_request("Invalid object key"),
            other => AppError::internal("Failed to download file", &other),
        })?;

    serve_file(&path, request).await
}

/// Hand the request to `ServeFile`. The file can vanish between the existence
/// check and the open; that 404 gets the JSON envelope like any other.
async fn serve_file(path: &std::path::Path, request: Request) -> Result<Response, AppError> {
    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        return Err(AppError::not_found(FILE_NOT_FOUND));
    }
    Ok(response.map(Body::new))
}

/// `GET /list/{bucket}` — names of the files in a bucket.
pub async fn list_objects(
    State(service): State<StorageService>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<BucketListResponse>, AppError> {
    let Path(bucket) = path?;
    let files = service
        .list_objects(&bucket)
        .await
        .map_err(|err| match err {
            StorageError::BucketNotFound(_) => AppError::not_found("Bucket not found"),
            StorageError::InvalidBucketName(_) => AppError::bad_request("Invalid bucket name"),
            other => AppError::internal("Failed to list bucket contents", &other),
        })?;

    Ok(Json(BucketListResponse { bucket, files }))
}

/// `DELETE /delete/{bucket}/{*key}` — remove one object.
pub async fn delete_object(
    State(service): State<StorageService>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path((bucket, key)) = path?;
    service
        .delete_object(&bucket, &key)
        .await
        .map_err(|err| match err {
            StorageError::ObjectNotFound { .. } => AppError::not_found(FILE_NOT_FOUND),
            StorageError::InvalidBucketName(_) => AppError::bad_request("Invalid bucket name"),
            StorageError::InvalidObjectKey(_) => AppError::bad_request("Invalid object key"),
            other => AppError::internal("Failed to delete file", &other),
        })?;

    info!(bucket = %bucket, key = %key, "object deleted");
    Ok(Json(MessageResponse::new(format!(
        "File {} deleted successfully",
        key
    ))))
}

/// True when a streaming upload failed because the request body hit its limit.
fn exceeded_body_limit(err: &io::Error) -> bool {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<MultipartError>())
        .is_some_and(|err| err.status() == StatusCode::PAYLOAD_TOO_LARGE)
}

/// Append `.<ext>` to `key` when an extension can be inferred and the key
/// does not already end with it (case-insensitive).
fn with_inferred_extension(key: String, mime_type: &str) -> String {
    let ext = StorageService::infer_extension(mime_type, &key);
    if ext.is_empty() {
        return key;
    }

    let suffix = format!(".{}", ext.to_lowercase());
    if key.to_lowercase().ends_with(&suffix) {
        key
    } else {
        format!("{}.{}", key, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_appended_from_content_type() {
        assert_eq!(with_inferred_extension("photo".into(), "image/png"), "photo.png");
        assert_eq!(with_inferred_extension("notes".into(), "text/plain"), "notes.txt");
    }

    #[test]
    fn test_extension_not_doubled() {
        assert_eq!(with_inferred_extension("photo.png".into(), "image/png"), "photo.png");
        assert_eq!(with_inferred_extension("PHOTO.PNG".into(), "image/png"), "PHOTO.PNG");
        // the key's own extension wins over the content type
        assert_eq!(with_inferred_extension("photo.jpg".into(), "image/png"), "photo.jpg");
    }

    #[test]
    fn test_generic_and_parameterized_content_types() {
        assert_eq!(
            with_inferred_extension("blob".into(), "application/octet-stream"),
            "blob"
        );
        assert_eq!(
            with_inferred_extension("notes".into(), "text/plain; charset=utf-8"),
            "notes.txt"
        );
    }

    #[test]
    fn test_dotted_keys_left_alone() {
        assert_eq!(with_inferred_extension(".env".into(), "text/plain"), ".env");
        assert_eq!(with_inferred_extension("photo.".into(), "image/png"), "photo.");
    }

    #[tokio::test]
    async fn test_serve_file_vanished_is_json_not_found() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("gone.txt");

        let request = axum::http::Request::get("/download/docs/gone.txt")
            .body(Body::empty())
            .unwrap();
        let err = serve_file(&path, request).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), FILE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_file_streams_existing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("here.txt");
        std::fs::write(&path, "hello").unwrap();

        let request = axum::http::Request::get("/download/docs/here.txt")
            .body(Body::empty())
            .unwrap();
        let response = serve_file(&path, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[test]
    fn test_unknown_content_type_leaves_key() {
        assert_eq!(with_inferred_extension("blob".into(), ""), "blob");
        assert_eq!(
            with_inferred_extension("blob".into(), "application/x-made-up"),
            "blob"
        );
    }
}
