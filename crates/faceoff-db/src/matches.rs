use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use faceoff_types::models::MatchRecord;

use crate::users::{WinRow, insert_win};
use crate::{Database, OptionalExt, key, ms, read_id, read_opt_time, read_time};

const MATCH_COLUMNS: &str = "id, photo_a, photo_b, viewer, proposed_at, judged, judged_at, scored_at,
     a_won, a_win_delta, a_lose_delta, b_win_delta, b_lose_delta";

fn map_match(row: &Row<'_>) -> rusqlite::Result<MatchRecord> {
    Ok(MatchRecord {
        id: read_id(row, 0)?,
        photo_a: read_id(row, 1)?,
        photo_b: read_id(row, 2)?,
        viewer: read_id(row, 3)?,
        proposed_at: read_time(row, 4)?,
        judged: row.get(5)?,
        judged_at: read_opt_time(row, 6)?,
        scored_at: read_opt_time(row, 7)?,
        a_won: row.get(8)?,
        a_win_delta: row.get(9)?,
        a_lose_delta: row.get(10)?,
        b_win_delta: row.get(11)?,
        b_lose_delta: row.get(12)?,
    })
}

/// Everything committed when a viewer judges a match.
pub struct Judgment<'a> {
    pub match_id: Uuid,
    pub a_won: bool,
    pub judged_at: DateTime<Utc>,
    pub shard: u32,
    pub event_payload: &'a [u8],
    pub win: &'a WinRow,
}

impl Database {
    /// Inserts a proposed match. Returns false if this viewer already has a
    /// record for the pair. The pair must already be in canonical order.
    pub fn insert_match(&self, record: &MatchRecord) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO matches (id, photo_a, photo_b, viewer, proposed_at, judged,
                                                a_win_delta, a_lose_delta, b_win_delta, b_lose_delta)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    key(&record.id),
                    key(&record.photo_a),
                    key(&record.photo_b),
                    key(&record.viewer),
                    ms(record.proposed_at),
                    record.a_win_delta,
                    record.a_lose_delta,
                    record.b_win_delta,
                    record.b_lose_delta,
                ],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn match_exists(&self, photo_a: &Uuid, photo_b: &Uuid, viewer: &Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM matches WHERE photo_a = ?1 AND photo_b = ?2 AND viewer = ?3",
                    rusqlite::params![key(photo_a), key(photo_b), key(viewer)],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn get_match(&self, id: &Uuid) -> Result<Option<MatchRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1"))?;
            let row = stmt.query_row([key(id)], map_match).optional()?;
            Ok(row)
        })
    }

    pub fn get_match_by_key(
        &self,
        photo_a: &Uuid,
        photo_b: &Uuid,
        viewer: &Uuid,
    ) -> Result<Option<MatchRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MATCH_COLUMNS} FROM matches WHERE photo_a = ?1 AND photo_b = ?2 AND viewer = ?3"
            ))?;
            let row = stmt
                .query_row(
                    rusqlite::params![key(photo_a), key(photo_b), key(viewer)],
                    map_match,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn matches_for_viewer(&self, viewer: &Uuid) -> Result<Vec<MatchRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MATCH_COLUMNS} FROM matches WHERE viewer = ?1 ORDER BY proposed_at, id"
            ))?;
            let rows = stmt
                .query_map([key(viewer)], map_match)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Conditionally marks a match judged, and in the same transaction appends
    /// its score event and credits the win. Returns false, writing nothing,
    /// if the match was already judged.
    pub fn record_judgment(&self, j: &Judgment<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let changed = tx.execute(
                "UPDATE matches SET judged = 1, judged_at = ?2, a_won = ?3
                 WHERE id = ?1 AND judged = 0",
                rusqlite::params![key(&j.match_id), ms(j.judged_at), j.a_won],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            crate::event_log::insert_event(&tx, j.shard, j.event_payload, j.judged_at)?;
            insert_win(&tx, j.win)?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn mark_scored(
        &self,
        photo_a: &Uuid,
        photo_b: &Uuid,
        viewer: &Uuid,
        scored_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE matches SET scored_at = ?4
                 WHERE photo_a = ?1 AND photo_b = ?2 AND viewer = ?3 AND judged = 1",
                rusqlite::params![key(photo_a), key(photo_b), key(viewer), ms(scored_at)],
            )?;
            Ok(changed == 1)
        })
    }
}
