use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Gender, MediaKind, Side, TournamentKind};

// -- Match stream --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchView {
    pub match_id: Uuid,
    pub photo_a: Uuid,
    pub photo_b: Uuid,
    pub a_win_delta: f64,
    pub a_lose_delta: f64,
    pub b_win_delta: f64,
    pub b_lose_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentView {
    pub tournament_id: Uuid,
    pub kind: TournamentKind,
    pub seeds: Vec<Uuid>,
}

/// One entry of a viewer's match stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StreamItem {
    Match(MatchView),
    Tournament(TournamentView),
}

impl StreamItem {
    /// `match`, or `tournament.<kind>`.
    pub fn kind_label(&self) -> String {
        match self {
            Self::Match(_) => "match".to_string(),
            Self::Tournament(t) => format!("tournament.{}", t.kind.as_str()),
        }
    }

    pub fn as_match(&self) -> Option<&MatchView> {
        match self {
            Self::Match(m) => Some(m),
            Self::Tournament(_) => None,
        }
    }

    pub fn as_tournament(&self) -> Option<&TournamentView> {
        match self {
            Self::Tournament(t) => Some(t),
            Self::Match(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MatchStreamQuery {
    #[serde(default)]
    pub reset_cadence: bool,
}

// -- Judging --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JudgeMatchRequest {
    pub winner: Side,
}

/// Winners of the fifteen bracket games in order: eight first-round games,
/// four quarter-finals, two semi-finals, the final.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JudgeTournamentRequest {
    pub votes: Vec<Uuid>,
}

// -- Leaderboards --

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub after: Option<Uuid>,
    pub count: Option<usize>,
}

// -- Users and photos --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    pub gender: Gender,
    pub view_gender: Gender,
    pub location_id: Uuid,
    #[serde(default)]
    pub is_test: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterUserResponse {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePhotoRequest {
    pub media_kind: MediaKind,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_test: bool,
    /// Hex-encoded perceptual hash, if the uploader computed one.
    pub duplicate_hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatePhotoResponse {
    pub photo_id: Uuid,
}

/// A match one of the user's photos won.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinView {
    pub photo_id: Uuid,
    pub match_id: Uuid,
    pub viewer: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddTagRequest {
    pub tag: String,
}

// -- Scheduled work --

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreTickReport {
    pub events_seen: usize,
    pub events_applied: usize,
    pub events_skipped: usize,
    pub photos_updated: usize,
    pub budget_exhausted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimReport {
    pub window: crate::models::Window,
    pub segments_scanned: usize,
    pub rows_deleted: usize,
}
