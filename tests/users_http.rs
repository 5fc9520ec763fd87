mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tower::util::ServiceExt;

use common::app::spawn_test_app;
use common::http::{assert_json_error, request, response_json, signup};

#[tokio::test]
async fn it_user_lookup_by_query() {
    let app = spawn_test_app().await;
    let user_id = signup(&app.app, 42).await;

    let response = request(
        &app.app,
        Method::GET,
        &format!("/users?user_id={user_id}"),
        None,
        &[],
    )
    .await;
    let (status, _, body) = response_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user_id);
    assert_eq!(body["chip_id"], 42);
    assert!(body["joined_timestamp"].is_i64());
}

#[tokio::test]
async fn it_user_lookup_by_json_body() {
    let app = spawn_test_app().await;
    let user_id = signup(&app.app, 9).await;

    let response = request(
        &app.app,
        Method::GET,
        "/users",
        Some(json!({ "user_id": user_id })),
        &[],
    )
    .await;
    let (status, _, body) = response_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chip_id"], 9);
}

#[tokio::test]
async fn it_unknown_user_is_bad_request() {
    let app = spawn_test_app().await;

    let response = request(&app.app, Method::GET, "/users?user_id=12345", None, &[]).await;
    let (status, _, body) = response_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "USER_NOT_FOUND");
}

#[tokio::test]
async fn it_missing_user_id_is_bad_request() {
    let app = spawn_test_app().await;

    let response = request(&app.app, Method::GET, "/users", None, &[]).await;
    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_ARGUMENT");
}

#[tokio::test]
async fn it_garbage_body_is_rejected() {
    let app = spawn_test_app().await;

    let req = Request::builder()
        .method(Method::GET)
        .uri("/users")
        .body(Body::from("not json"))
        .unwrap();
    let response = app.app.clone().oneshot(req).await.unwrap();
    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_REQUEST_BODY");
}
