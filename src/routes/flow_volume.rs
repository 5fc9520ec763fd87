use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::extractors::JsonBody;
use crate::response::AppError;
use crate::services::aggregator::{self, FlowReading, FlowSnapshot};
use crate::services::ServiceError;
use crate::state::AppState;
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/flow_volume",
        get(get_flow_volume).post(post_flow_volume),
    )
}

#[derive(Debug, Deserialize)]
struct FlowVolumeQuery {
    chip_id: Option<String>,
    user_id: Option<String>,
}

async fn get_flow_volume(
    State(state): State<AppState>,
    Query(query): Query<FlowVolumeQuery>,
) -> Result<Json<FlowSnapshot>, AppError> {
    let chip_id = validation::query_id(query.chip_id.as_deref(), "chip_id")
        .map_err(ServiceError::InvalidArgument)?;
    let user_id = validation::query_id(query.user_id.as_deref(), "user_id")
        .map_err(ServiceError::InvalidArgument)?;

    Ok(Json(aggregator::get_counters(state.store(), chip_id, user_id)?))
}

#[derive(Debug, Deserialize)]
struct FlowReadingRequest {
    chip_id: Option<Value>,
    user_id: Option<Value>,
    flow_volume: Option<Value>,
}

async fn post_flow_volume(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<FlowReadingRequest>,
) -> Result<StatusCode, AppError> {
    tracing::debug!(body = ?req, "Received flow reading");

    let flow_volume =
        validation::flow_volume(req.flow_volume.as_ref()).map_err(ServiceError::InvalidArgument)?;
    // Ids are not range checked here, but must still be integers.
    let reading = FlowReading {
        chip_id: validation::reading_id(req.chip_id.as_ref(), "chip_id")
            .map_err(ServiceError::InvalidArgument)?,
        user_id: validation::reading_id(req.user_id.as_ref(), "user_id")
            .map_err(ServiceError::InvalidArgument)?,
        flow_volume,
    };

    aggregator::record_flow(state.store(), &reading)?;
    Ok(StatusCode::OK)
}
