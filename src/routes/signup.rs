use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::extractors::JsonBody;
use crate::response::AppError;
use crate::services::registry::{self, Registration};
use crate::services::ServiceError;
use crate::state::AppState;
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new().route("/signup", post(signup))
}

#[derive(Debug, Deserialize)]
struct SignupRequest {
    chip_id: Option<Value>,
}

async fn signup(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> Result<Json<Registration>, AppError> {
    let chip_id =
        validation::signup_chip_id(req.chip_id.as_ref()).map_err(ServiceError::InvalidArgument)?;
    let registration = registry::register(state.store(), chip_id)?;
    Ok(Json(registration))
}
