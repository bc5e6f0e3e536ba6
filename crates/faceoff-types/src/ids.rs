/// Time-ordered identifier packing.
///
/// A version-1 UUID stores its timestamp low word first, so raw byte order does
/// not follow creation order. Packing moves the timestamp to the front,
/// most-significant word first:
///
/// `time_hi_version(2) | time_mid(2) | time_low(4) | clock_seq_hi(1) | clock_seq_low(1) | node(6)`
///
/// Packed ids compare (as bytes or as lowercase hex) in chronological order,
/// which is what every composite key in the store relies on.
use std::cmp::Ordering;
use std::sync::OnceLock;

use thiserror::Error;
use uuid::Uuid;

/// Length of a packed id rendered as hex.
pub const PACKED_HEX_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("packed id must be {PACKED_HEX_LEN} hex chars, got {0}")]
    BadLength(usize),
    #[error("packed id is not hex: {0}")]
    NotHex(String),
}

pub fn pack_uuid(id: &Uuid) -> [u8; 16] {
    let b = id.as_bytes();
    let mut out = [0u8; 16];
    out[0..2].copy_from_slice(&b[6..8]);
    out[2..4].copy_from_slice(&b[4..6]);
    out[4..8].copy_from_slice(&b[0..4]);
    out[8..16].copy_from_slice(&b[8..16]);
    out
}

pub fn unpack_uuid(packed: &[u8; 16]) -> Uuid {
    let mut b = [0u8; 16];
    b[0..4].copy_from_slice(&packed[4..8]);
    b[4..6].copy_from_slice(&packed[2..4]);
    b[6..8].copy_from_slice(&packed[0..2]);
    b[8..16].copy_from_slice(&packed[8..16]);
    Uuid::from_bytes(b)
}

/// Packed id as lowercase hex. This is the form stored in every key column.
pub fn packed_hex(id: &Uuid) -> String {
    hex::encode(pack_uuid(id))
}

pub fn unpack_hex(s: &str) -> Result<Uuid, IdError> {
    if s.len() != PACKED_HEX_LEN {
        return Err(IdError::BadLength(s.len()));
    }
    let mut packed = [0u8; 16];
    hex::decode_to_slice(s, &mut packed).map_err(|e| IdError::NotHex(e.to_string()))?;
    Ok(unpack_uuid(&packed))
}

/// Chronological comparison of two ids.
pub fn compare_ids(a: &Uuid, b: &Uuid) -> Ordering {
    pack_uuid(a).cmp(&pack_uuid(b))
}

/// Orders a pair so that `a < b` under packed comparison.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if compare_ids(&a, &b) == Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    }
}

/// Fresh time-ordered (version 1) id. The node field is random per process.
pub fn new_id() -> Uuid {
    static NODE: OnceLock<[u8; 6]> = OnceLock::new();
    let node = NODE.get_or_init(|| {
        let mut node = [0u8; 6];
        node.copy_from_slice(&Uuid::new_v4().as_bytes()[10..16]);
        node
    });
    Uuid::now_v1(node)
}
