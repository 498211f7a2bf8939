//! Object-level request/response bodies.

use serde::{Deserialize, Serialize};

/// Query string accepted by `PUT /upload/{bucket}`.
#[derive(Deserialize, Debug, Default)]
pub struct UploadQuery {
    /// Key to store the object under. Defaults to the uploaded filename.
    pub key: Option<String>,
}

/// Body returned after a successful upload.
#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub message: String,
    pub bucket: String,
    /// Final key, including any inferred extension.
    pub key: String,
    /// Bytes written to disk.
    pub size: u64,
    /// Content type declared by the uploaded part. Not persisted.
    pub mimetype: String,
}
