/// Shared domain types for the faceoff rating, matchmaking and leaderboard
/// services. No I/O lives here.
pub mod api;
pub mod event;
pub mod feed;
pub mod ids;
pub mod models;

pub use event::{ScoreEvent, SCORE_EVENT_LEN};
pub use ids::{canonical_pair, new_id, pack_uuid, packed_hex, unpack_hex, unpack_uuid};
pub use models::{
    CadenceState, Gender, LeaderboardRow, MatchRecord, MediaKind, Photo, Segment, Side,
    TagScoreRow, Tournament, TournamentKind, User, Window,
};
