//! GET /health: liveness plus which optional collaborators are active

use hyper::{Response, StatusCode};
use serde::Serialize;

use super::response::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Seconds since the server state was built
    pub uptime: u64,
    pub mode: &'static str,
    pub instance_id: String,
    /// `mongodb` or `memory`
    pub persistence: &'static str,
    /// `http-relay` or `console`
    pub mail: &'static str,
    pub roadmap: RoadmapStatus,
}

#[derive(Serialize)]
pub struct RoadmapStatus {
    pub configured: bool,
    pub models: Vec<String>,
}

pub fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        instance_id: state.args.instance_id.to_string(),
        persistence: state.persistence,
        mail: state.accounts.notifier_kind(),
        roadmap: RoadmapStatus {
            configured: state.roadmap.is_configured(),
            models: state.roadmap.candidates().to_vec(),
        },
    }
}

pub fn health_check(state: &AppState) -> Response<BoxBody> {
    json_response(StatusCode::OK, &build_health_response(state))
}
