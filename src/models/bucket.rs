//! Bucket-level request/response bodies.

use serde::{Deserialize, Serialize};

/// Body of `POST /buckets`.
///
/// A missing `name` deserializes to an empty string so it is reported as
/// "required" rather than as malformed JSON.
#[derive(Deserialize, Debug)]
pub struct CreateBucketRequest {
    #[serde(default)]
    pub name: String,
}

/// Body of `GET /buckets`.
#[derive(Serialize, Debug)]
pub struct BucketsResponse {
    pub buckets: Vec<String>,
}

/// Body of `GET /list/{bucket}`.
#[derive(Serialize, Debug)]
pub struct BucketListResponse {
    pub bucket: String,
    pub files: Vec<String>,
}
