use axum::{
    Json,
    extract::{Path, Query, State},
};

use faceoff_engine::Board;
use faceoff_types::api::PageQuery;
use faceoff_types::models::{Gender, Photo, Segment};

use crate::error::ApiError;
use crate::{AppState, blocking};

/// `all` reads across every segment; anything else is taken as a segment key.
fn parse_segment(raw: &str) -> Segment {
    if raw == Segment::ALL {
        Segment::all()
    } else {
        Segment::from_raw(raw)
    }
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path((segment, board)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Photo>>, ApiError> {
    let board: Board = board.parse().map_err(ApiError::BadRequest)?;
    let segment = parse_segment(&segment);
    let photos = blocking(&state, move |engine| {
        let count = page.count.unwrap_or(engine.config().max_page);
        engine.get_leaderboard(&segment, board, page.after, count)
    })
    .await?;
    Ok(Json(photos))
}

pub async fn get_tag_top(
    State(state): State<AppState>,
    Path((gender, tag)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Photo>>, ApiError> {
    let gender: Gender = gender.parse().map_err(ApiError::BadRequest)?;
    let photos = blocking(&state, move |engine| {
        let count = page.count.unwrap_or(engine.config().max_page);
        engine.get_tag_top(gender, &tag, page.after, count)
    })
    .await?;
    Ok(Json(photos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_the_cross_segment_sentinel() {
        assert!(parse_segment("all").is_all());
        assert!(!parse_segment("f0123").is_all());
    }
}
