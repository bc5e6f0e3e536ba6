/// Score Event wire layout.
///
/// An event names a judged match by its key: the canonical photo pair and the
/// viewer. On the log it is 96 ASCII bytes, three packed ids in hex:
/// `photo_a(32) | photo_b(32) | viewer(32)`.
use thiserror::Error;
use uuid::Uuid;

use crate::ids::{canonical_pair, packed_hex, unpack_hex, IdError, PACKED_HEX_LEN};

pub const SCORE_EVENT_LEN: usize = 3 * PACKED_HEX_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoreEvent {
    pub photo_a: Uuid,
    pub photo_b: Uuid,
    pub viewer: Uuid,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventDecodeError {
    #[error("score event must be {SCORE_EVENT_LEN} bytes, got {0}")]
    BadLength(usize),
    #[error("score event is not ascii")]
    NotAscii,
    #[error("bad id in score event: {0}")]
    BadId(#[from] IdError),
    #[error("score event pair is not in canonical order")]
    NotCanonical,
}

impl ScoreEvent {
    /// Builds an event, putting the pair in canonical order.
    pub fn new(photo_x: Uuid, photo_y: Uuid, viewer: Uuid) -> Self {
        let (photo_a, photo_b) = canonical_pair(photo_x, photo_y);
        Self { photo_a, photo_b, viewer }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::with_capacity(SCORE_EVENT_LEN);
        out.push_str(&packed_hex(&self.photo_a));
        out.push_str(&packed_hex(&self.photo_b));
        out.push_str(&packed_hex(&self.viewer));
        out.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EventDecodeError> {
        if bytes.len() != SCORE_EVENT_LEN {
            return Err(EventDecodeError::BadLength(bytes.len()));
        }
        let text = std::str::from_utf8(bytes).map_err(|_| EventDecodeError::NotAscii)?;
        if !text.is_ascii() {
            return Err(EventDecodeError::NotAscii);
        }
        let photo_a = unpack_hex(&text[..PACKED_HEX_LEN])?;
        let photo_b = unpack_hex(&text[PACKED_HEX_LEN..2 * PACKED_HEX_LEN])?;
        let viewer = unpack_hex(&text[2 * PACKED_HEX_LEN..])?;
        if canonical_pair(photo_a, photo_b) != (photo_a, photo_b) {
            return Err(EventDecodeError::NotCanonical);
        }
        Ok(Self { photo_a, photo_b, viewer })
    }
}
