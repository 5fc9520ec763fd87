use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

const PROBE_KEY: &str = "__health_check__";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/store", get(store_health))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": state.uptime_secs(),
        "store": {
            "backend": state.store().backend_name(),
        }
    }))
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().exists(PROBE_KEY) {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Store probe failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn store_health(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let probe = state.store().exists(PROBE_KEY);
    let latency_us = start.elapsed().as_micros() as u64;
    let entries = state.store().len().ok();

    Json(serde_json::json!({
        "healthy": probe.is_ok(),
        "backend": state.store().backend_name(),
        "latencyUs": latency_us,
        "entries": entries,
        "keyPrefix": state.config().store.key_prefix,
    }))
}
