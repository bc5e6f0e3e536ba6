use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use faceoff_types::ids::{packed_hex, unpack_hex};
use faceoff_types::models::{CadenceState, Segment, Tournament};

use crate::{Database, OptionalExt, key, ms, read_id, read_opt_id, read_opt_time, read_parsed, read_time};

fn encode_ids(ids: &[Uuid]) -> Result<String> {
    let keys: Vec<String> = ids.iter().map(packed_hex).collect();
    Ok(serde_json::to_string(&keys)?)
}

fn decode_ids(idx: usize, raw: &str) -> rusqlite::Result<Vec<Uuid>> {
    let fail = |msg: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
    };
    let keys: Vec<String> = serde_json::from_str(raw).map_err(|e| fail(e.to_string()))?;
    keys.iter()
        .map(|k| unpack_hex(k).map_err(|e| fail(e.to_string())))
        .collect()
}

fn map_tournament(row: &Row<'_>) -> rusqlite::Result<Tournament> {
    let segment: String = row.get(3)?;
    let seeds: String = row.get(4)?;
    let results: Option<String> = row.get(5)?;
    Ok(Tournament {
        id: read_id(row, 0)?,
        viewer: read_id(row, 1)?,
        kind: read_parsed(row, 2)?,
        segment: Segment::from_raw(segment),
        seeds: decode_ids(4, &seeds)?,
        results: match results {
            Some(raw) => decode_ids(5, &raw)?,
            None => Vec::new(),
        },
        winner: read_opt_id(row, 6)?,
        created_at: read_time(row, 7)?,
        judged: row.get(8)?,
        judged_at: read_opt_time(row, 9)?,
    })
}

impl Database {
    // -- Tournaments --

    pub fn insert_tournament(&self, t: &Tournament) -> Result<()> {
        let seeds = encode_ids(&t.seeds)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO tournaments (id, viewer, kind, segment, seeds, created_at, judged)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                rusqlite::params![
                    key(&t.id),
                    key(&t.viewer),
                    t.kind.as_str(),
                    t.segment.as_str(),
                    seeds,
                    ms(t.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_tournament(&self, id: &Uuid) -> Result<Option<Tournament>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, viewer, kind, segment, seeds, results, winner, created_at, judged, judged_at
                 FROM tournaments WHERE id = ?1",
            )?;
            let row = stmt.query_row([key(id)], map_tournament).optional()?;
            Ok(row)
        })
    }

    /// Writes the whole bracket at once. Returns false if it was already judged.
    pub fn judge_tournament(
        &self,
        id: &Uuid,
        results: &[Uuid],
        winner: &Uuid,
        judged_at: DateTime<Utc>,
    ) -> Result<bool> {
        let results = encode_ids(results)?;
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE tournaments SET results = ?2, winner = ?3, judged = 1, judged_at = ?4
                 WHERE id = ?1 AND judged = 0",
                rusqlite::params![key(id), results, key(winner), ms(judged_at)],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Cadence --

    pub fn load_cadence(&self, viewer: &Uuid) -> Result<Option<CadenceState>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT matches_until_next, next_kind, last_touched FROM cadence WHERE viewer = ?1",
                [key(viewer)],
                |row| {
                    Ok(CadenceState {
                        matches_until_next_tournament: row.get(0)?,
                        next_tournament_kind: read_parsed(row, 1)?,
                        last_touched: read_time(row, 2)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Blind put; concurrent requests from one viewer are last-writer-wins.
    pub fn save_cadence(&self, viewer: &Uuid, state: &CadenceState) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO cadence (viewer, matches_until_next, next_kind, last_touched)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (viewer) DO UPDATE SET
                    matches_until_next = excluded.matches_until_next,
                    next_kind = excluded.next_kind,
                    last_touched = excluded.last_touched",
                rusqlite::params![
                    key(viewer),
                    state.matches_until_next_tournament,
                    state.next_tournament_kind.as_str(),
                    ms(state.last_touched),
                ],
            )?;
            Ok(())
        })
    }
}
