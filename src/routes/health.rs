//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - liveness (is the service running?)
//! - /ready, /readyz - readiness (can the service reach MongoDB?)
//!
//! In dev mode the readiness probe passes without a database so the
//! service can be driven against stubs.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

/// Health response body
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status (true if service is running)
    pub healthy: bool,
    /// Service version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    /// Current timestamp
    pub timestamp: String,
    /// Operating mode
    pub mode: String,
    /// Node identifier
    pub node_id: String,
    /// Database connectivity
    pub database: DatabaseHealth,
}

/// Database connection health details
#[derive(Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
}

fn build_health_response(state: &AppState, db_connected: bool) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        database: DatabaseHealth {
            connected: db_connected,
        },
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// Handle liveness probe (/health, /healthz)
///
/// Returns 200 OK whenever the service is running; database status is
/// informational here.
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state, state.mongo.is_some());
    json_response(StatusCode::OK, &response)
}

/// Handle readiness probe (/ready, /readyz)
///
/// Returns 200 OK only if MongoDB answers a ping (or dev mode is on).
/// Use this endpoint for load balancer health checks.
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let db_connected = match &state.mongo {
        Some(mongo) => mongo.ping().await.is_ok(),
        None => false,
    };

    let is_ready = db_connected || state.args.dev_mode;
    let response = build_health_response(&state, db_connected);

    let status = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(status, &response)
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Git commit hash (full)
    pub commit_full: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
///
/// Returns build information for deployment verification.
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "caselog",
    };

    json_response(StatusCode::OK, &response)
}
