use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

pub async fn request(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    headers: &[(&str, String)],
) -> Response {
    let mut builder = Request::builder().method(method).uri(path);

    for (k, v) in headers {
        builder = builder.header(*k, v.as_str());
    }

    let req = if let Some(payload) = body {
        builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("empty body")
    };

    app.clone().oneshot(req).await.expect("oneshot response")
}

pub async fn response_json(resp: Response) -> (StatusCode, HeaderMap, Value) {
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body bytes");

    let json = if bytes.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_slice::<Value>(&bytes).expect("parse json body")
    };

    (status, headers, json)
}

pub fn assert_json_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], code);
    assert!(body.get("message").is_some());
}

/// POST /signup and return the assigned user id.
pub async fn signup(app: &Router, chip_id: u32) -> u32 {
    let response = request(
        app,
        Method::POST,
        "/signup",
        Some(serde_json::json!({ "chip_id": chip_id })),
        &[],
    )
    .await;
    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::OK, "signup failed: {body}");
    body["user_id"].as_u64().expect("user_id in signup response") as u32
}

pub async fn post_reading(app: &Router, payload: Value) -> (StatusCode, Value) {
    let response = request(app, Method::POST, "/flow_volume", Some(payload), &[]).await;
    let (status, _, body) = response_json(response).await;
    (status, body)
}

pub async fn get_snapshot(app: &Router, chip_id: u32, user_id: u32) -> Value {
    let uri = format!("/flow_volume?chip_id={chip_id}&user_id={user_id}");
    let response = request(app, Method::GET, &uri, None, &[]).await;
    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::OK, "snapshot failed: {body}");
    body
}
