use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use faceoff_types::api::{
    JudgeMatchRequest, JudgeTournamentRequest, MatchStreamQuery, MatchView, StreamItem,
};
use faceoff_types::models::Tournament;

use crate::error::ApiError;
use crate::{AppState, blocking};

pub async fn get_match_stream(
    State(state): State<AppState>,
    Path(viewer_id): Path<Uuid>,
    Query(query): Query<MatchStreamQuery>,
) -> Result<Json<Vec<StreamItem>>, ApiError> {
    let items = blocking(&state, move |engine| {
        engine.get_match_stream(&viewer_id, query.reset_cadence)
    })
    .await?;
    Ok(Json(items))
}

pub async fn get_tag_match_stream(
    State(state): State<AppState>,
    Path((viewer_id, tag)): Path<(Uuid, String)>,
) -> Result<Json<Vec<MatchView>>, ApiError> {
    let items = blocking(&state, move |engine| {
        engine.get_tag_match_stream(&viewer_id, &tag)
    })
    .await?;
    Ok(Json(items))
}

pub async fn get_match_for(
    State(state): State<AppState>,
    Path((viewer_id, photo_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MatchView>, ApiError> {
    let view = blocking(&state, move |engine| engine.get_match_for(&viewer_id, &photo_id)).await?;
    Ok(Json(view))
}

pub async fn judge_match(
    State(state): State<AppState>,
    Path((viewer_id, match_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<JudgeMatchRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |engine| {
        engine.judge_match(&viewer_id, &match_id, req.winner)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_tournament(
    State(state): State<AppState>,
    Path((viewer_id, tournament_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Tournament>, ApiError> {
    let tournament = blocking(&state, move |engine| {
        engine.get_tournament(&viewer_id, &tournament_id)
    })
    .await?;
    Ok(Json(tournament))
}

pub async fn judge_tournament(
    State(state): State<AppState>,
    Path((viewer_id, tournament_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<JudgeTournamentRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |engine| {
        engine.judge_tournament(&viewer_id, &tournament_id, &req.votes)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
