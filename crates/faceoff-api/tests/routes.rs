use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use faceoff_db::Database;
use faceoff_engine::{Engine, EngineConfig};

const LOCATION: &str = "6f2c3a1e-0000-4000-8000-000000000001";

fn app() -> Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let engine = Engine::new(db, EngineConfig::default()).with_seed(7);
    faceoff_api::router(Arc::new(engine))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn user(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/users",
        Some(json!({ "gender": "female", "view_gender": "female", "location_id": LOCATION })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["user_id"].as_str().unwrap().to_string()
}

async fn ready_photo(app: &Router, owner: &str, tags: &[&str]) -> String {
    let (status, body) = send(
        app,
        "POST",
        &format!("/users/{owner}/photos"),
        Some(json!({ "media_kind": "photo", "tags": tags })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let photo_id = body["photo_id"].as_str().unwrap().to_string();
    let (status, _) = send(app, "POST", &format!("/photos/{photo_id}/ready"), None).await;
    assert_eq!(status, StatusCode::OK);
    photo_id
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn match_can_be_judged_once() {
    let app = app();
    let viewer = user(&app).await;
    for _ in 0..2 {
        let owner = user(&app).await;
        ready_photo(&app, &owner, &[]).await;
    }

    let (status, items) = send(&app, "GET", &format!("/viewers/{viewer}/matches"), None).await;
    assert_eq!(status, StatusCode::OK);
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "match");
    let match_id = items[0]["data"]["match_id"].as_str().unwrap();

    let judge = format!("/viewers/{viewer}/matches/{match_id}/judge");
    let (status, _) = send(&app, "POST", &judge, Some(json!({ "winner": "a" }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "POST", &judge, Some(json!({ "winner": "b" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = send(&app, "GET", &format!("/viewers/{viewer}/matches"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_resources_are_not_found() {
    let app = app();
    let missing = "00000000-0000-1000-8000-000000000000";

    let (status, body) = send(&app, "GET", &format!("/users/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let viewer = user(&app).await;
    let (status, _) = send(
        &app,
        "GET",
        &format!("/viewers/{viewer}/photos/{missing}/match"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/viewers/{viewer}/matches/{missing}/judge"),
        Some(json!({ "winner": "a" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_input_is_rejected() {
    let app = app();
    let (status, _) = send(&app, "GET", "/leaderboards/all/fortnight", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/tags/x/beach", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let owner = user(&app).await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/{owner}/photos"),
        Some(json!({ "media_kind": "photo", "duplicate_hash": "zz" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn duplicate_upload_is_a_bad_request() {
    let app = app();
    let owner = user(&app).await;
    let upload = json!({ "media_kind": "photo", "duplicate_hash": "00ff00ff" });
    let uri = format!("/users/{owner}/photos");
    let (status, _) = send(&app, "POST", &uri, Some(upload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, "POST", &uri, Some(upload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn boards_list_ready_photos() {
    let app = app();
    let owner = user(&app).await;
    let photo = ready_photo(&app, &owner, &["Beach"]).await;
    let other = user(&app).await;
    ready_photo(&app, &other, &[]).await;

    let (status, body) = send(&app, "GET", "/leaderboards/all/alltime?count=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(&app, "GET", "/tags/f/beach", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![photo.as_str()]);

    let (status, _) = send(&app, "DELETE", &format!("/photos/{photo}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", "/tags/female/beach", None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn owners_tag_their_own_photos() {
    let app = app();
    let owner = user(&app).await;
    let stranger = user(&app).await;
    let photo = ready_photo(&app, &owner, &[]).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/{owner}/photos/{photo}/tags"),
        Some(json!({ "tag": "Forest" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["added"], true);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/users/{stranger}/photos/{photo}/tags"),
        Some(json!({ "tag": "Forest" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
