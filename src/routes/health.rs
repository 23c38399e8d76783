//! Health check endpoint
//!
//! Liveness only: returns 200 while the process is serving requests and
//! reports which content store backs achievement documents.

use hyper::{Response, StatusCode};
use serde::Serialize;

use super::response::{json_response, FullBody};
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub content_store: &'static str,
    pub mode: &'static str,
    pub timestamp: String,
}

pub fn health_check(state: &AppState) -> Response<FullBody> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        content_store: state.content_backend,
        mode: if state.args.dev_mode { "development" } else { "production" },
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    json_response(StatusCode::OK, &response)
}
