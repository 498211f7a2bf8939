//! Request and response bodies exchanged over the JSON API.
//!
//! Buckets and objects have no stored representation beyond the filesystem,
//! so these types only describe what travels on the wire.

use serde::Serialize;

pub mod bucket;
pub mod health;
pub mod object;

/// Generic `{"message": ...}` confirmation body.
#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
