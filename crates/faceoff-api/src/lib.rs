//! JSON request layer over [`faceoff_engine::Engine`].
//!
//! The engine is synchronous and talks to SQLite, so every handler hands its
//! work to [`tokio::task::spawn_blocking`].

pub mod boards;
pub mod error;
pub mod matches;
pub mod users;

use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{get, post},
};
use tracing::error;

use faceoff_engine::Engine;

use crate::error::ApiError;

pub type AppState = Arc<Engine>;

pub fn router(engine: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", post(users::register_user))
        .route("/users/{user_id}", get(users::get_user))
        .route("/users/{user_id}/wins", get(users::get_wins))
        .route("/users/{user_id}/photos", post(users::create_photo))
        .route("/users/{user_id}/photos/{photo_id}/tags", post(users::add_tag))
        .route("/photos/{photo_id}", get(users::get_photo).delete(users::take_down))
        .route("/photos/{photo_id}/ready", post(users::mark_ready))
        .route("/viewers/{viewer_id}/matches", get(matches::get_match_stream))
        .route("/viewers/{viewer_id}/tags/{tag}/matches", get(matches::get_tag_match_stream))
        .route("/viewers/{viewer_id}/photos/{photo_id}/match", get(matches::get_match_for))
        .route("/viewers/{viewer_id}/matches/{match_id}/judge", post(matches::judge_match))
        .route("/viewers/{viewer_id}/tournaments/{tournament_id}", get(matches::get_tournament))
        .route(
            "/viewers/{viewer_id}/tournaments/{tournament_id}/judge",
            post(matches::judge_tournament),
        )
        .route("/leaderboards/{segment}/{board}", get(boards::get_leaderboard))
        .route("/tags/{gender}/{tag}", get(boards::get_tag_top))
        .with_state(engine)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Runs an engine call on the blocking pool.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Engine) -> faceoff_engine::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = state.clone();
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}
