use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TournamentKind;

/// Events handed to the feed/notification collaborator. Delivery is
/// fire-and-forget; nothing in the rating pipeline waits on a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedEvent {
    /// A viewer picked this photo in a head-to-head match
    MatchWon {
        match_id: Uuid,
        photo_id: Uuid,
        owner_id: Uuid,
        viewer: Uuid,
    },

    /// A photo took the final of a viewer's bracket
    TournamentWon {
        tournament_id: Uuid,
        kind: TournamentKind,
        photo_id: Uuid,
        owner_id: Uuid,
        viewer: Uuid,
    },
}

impl FeedEvent {
    /// Owner of the photo the event is about, i.e. who gets notified.
    pub fn recipient(&self) -> Uuid {
        match self {
            Self::MatchWon { owner_id, .. } => *owner_id,
            Self::TournamentWon { owner_id, .. } => *owner_id,
        }
    }
}
