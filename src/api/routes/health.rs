use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::api::RelayState;
use crate::config::BackendAvailability;

pub async fn health_check(State(state): State<RelayState>) -> Json<Value> {
    let upstream = match state.upstream.availability() {
        BackendAvailability::Unconfigured => "unconfigured",
        BackendAvailability::LocalInDeployment(_) => "local",
        BackendAvailability::Configured(_) => "configured",
    };
    Json(json!({
        "ok": true,
        "service": "agentdeck",
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": option_env!("GIT_HASH").unwrap_or("dev"),
        "built": option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        "upstream": upstream,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
