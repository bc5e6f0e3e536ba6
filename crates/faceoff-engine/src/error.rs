use thiserror::Error;
use uuid::Uuid;

use faceoff_rating::RatingError;

#[derive(Debug, Error)]
pub enum FaceoffError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("photo {0} not found")]
    PhotoNotFound(Uuid),

    #[error("no opponent available for photo {0}")]
    NoOpponent(Uuid),

    #[error("already judged")]
    AlreadyJudged,

    #[error("not enough photos to build a match")]
    InsufficientPool,

    #[error(transparent)]
    InvalidRating(#[from] RatingError),

    #[error("invalid bracket: {0}")]
    InvalidBracket(String),

    #[error("photo duplicates {0}")]
    DuplicatePhoto(Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store busy after {attempts} attempts: {source}")]
    TransientStore {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("cursor for shard {shard} rejected: {reason}")]
    CorruptCursor { shard: u32, reason: String },

    #[error("undecodable score event at seq {seq}: {reason}")]
    CorruptEvent { seq: i64, reason: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FaceoffError>;
