use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;

use crate::response::AppError;

/// `axum::Json<T>` that rejects with an [`AppError`] JSON body instead of
/// axum's plain-text rejection.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection_to_app_error(rejection)),
        }
    }
}

fn json_rejection_to_app_error(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(error = %rejection, "Rejected oversized request body");
        return AppError::payload_too_large("Request body exceeds 64 KiB");
    }

    let reason = match &rejection {
        JsonRejection::JsonDataError(_) => "JSON data deserialization failed",
        JsonRejection::JsonSyntaxError(_) => "JSON syntax parsing failed",
        JsonRejection::MissingJsonContentType(_) => "Missing or invalid JSON Content-Type",
        JsonRejection::BytesRejection(_) => "Failed to read request body bytes",
        _ => "Unexpected JSON body rejection",
    };
    tracing::warn!(error = %rejection, reason, "Rejected request body");
    AppError::bad_request("INVALID_REQUEST_BODY", "Request body must be a JSON object")
}
