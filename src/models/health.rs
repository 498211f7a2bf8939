//! Health and readiness bodies.

use serde::Serialize;
use std::collections::HashMap;

/// One entry of the capability list returned by `GET /health`.
#[derive(Serialize, Debug)]
pub struct Endpoint {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub message: String,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Serialize, Debug)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize, Debug)]
pub struct CheckStatus {
    pub ok: bool,
    pub error: Option<String>,
}
