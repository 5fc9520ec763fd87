use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::response::AppError;
use crate::services::registry::{self, UserRecord};
use crate::services::ServiceError;
use crate::state::AppState;
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new().route("/users", get(get_user))
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    user_id: Option<Value>,
}

/// `user_id` comes from the query string, or from a JSON body when the
/// query has none.
async fn get_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    body: Bytes,
) -> Result<Json<UserRecord>, AppError> {
    let user_id = match query.user_id {
        Some(raw) => validation::query_id(Some(&raw), "user_id"),
        None if !body.is_empty() => {
            let parsed: UserBody = serde_json::from_slice(&body).map_err(|e| {
                tracing::warn!(error = %e, "Rejected /users body");
                AppError::bad_request("INVALID_REQUEST_BODY", "Request body must be a JSON object")
            })?;
            validation::body_id(parsed.user_id.as_ref(), "user_id")
        }
        None => validation::query_id(None, "user_id"),
    }
    .map_err(ServiceError::InvalidArgument)?;

    Ok(Json(registry::lookup(state.store(), user_id)?))
}
