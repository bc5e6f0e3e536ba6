use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use faceoff_engine::NewPhoto;
use faceoff_types::api::{
    AddTagRequest, CreatePhotoRequest, CreatePhotoResponse, PageQuery, RegisterUserRequest,
    RegisterUserResponse, WinView,
};
use faceoff_types::models::{Photo, User};

use crate::error::ApiError;
use crate::{AppState, blocking};

pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<RegisterUserResponse>), ApiError> {
    let user = blocking(&state, move |engine| {
        engine.register_user(req.gender, req.view_gender, req.location_id, req.is_test)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(RegisterUserResponse { user_id: user.id })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let user = blocking(&state, move |engine| engine.get_user(&user_id)).await?;
    Ok(Json(user))
}

pub async fn get_wins(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<WinView>>, ApiError> {
    let wins = blocking(&state, move |engine| {
        let count = page.count.unwrap_or(engine.config().max_page);
        engine.wins_for_user(&user_id, count)
    })
    .await?;
    Ok(Json(
        wins.into_iter()
            .map(|w| WinView {
                photo_id: w.photo_id,
                match_id: w.match_id,
                viewer: w.viewer,
                created_at: w.created_at,
            })
            .collect(),
    ))
}

pub async fn create_photo(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<CreatePhotoRequest>,
) -> Result<(StatusCode, Json<CreatePhotoResponse>), ApiError> {
    let duplicate_hash = req
        .duplicate_hash
        .as_deref()
        .map(hex::decode)
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("duplicate_hash is not hex: {e}")))?;
    let new = NewPhoto {
        media_kind: req.media_kind,
        tags: req.tags,
        is_test: req.is_test,
        duplicate_hash,
    };

    let photo = blocking(&state, move |engine| engine.create_photo(&user_id, new)).await?;
    Ok((StatusCode::CREATED, Json(CreatePhotoResponse { photo_id: photo.id })))
}

pub async fn get_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
) -> Result<Json<Photo>, ApiError> {
    let photo = blocking(&state, move |engine| engine.get_photo(&photo_id)).await?;
    Ok(Json(photo))
}

pub async fn mark_ready(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
) -> Result<Json<Photo>, ApiError> {
    let photo = blocking(&state, move |engine| engine.mark_ready(&photo_id)).await?;
    Ok(Json(photo))
}

pub async fn take_down(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |engine| engine.take_down(&photo_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_tag(
    State(state): State<AppState>,
    Path((user_id, photo_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AddTagRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let added = blocking(&state, move |engine| {
        engine.add_tag(&user_id, &photo_id, &req.tag)
    })
    .await?;
    Ok(Json(serde_json::json!({ "added": added })))
}
