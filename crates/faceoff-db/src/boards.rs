use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use faceoff_types::models::{LeaderboardRow, Segment, TagScoreRow, Window};

use crate::{Database, key, ms, read_id, read_parsed, read_time};

fn map_leaderboard_row(row: &Row<'_>) -> rusqlite::Result<LeaderboardRow> {
    let segment: String = row.get(1)?;
    Ok(LeaderboardRow {
        window: read_parsed(row, 0)?,
        segment: Segment::from_raw(segment),
        photo_id: read_id(row, 2)?,
        rating: row.get(3)?,
        posted_at: read_time(row, 4)?,
    })
}

fn map_tag_score(row: &Row<'_>) -> rusqlite::Result<TagScoreRow> {
    Ok(TagScoreRow {
        gender_tag: row.get(0)?,
        photo_id: read_id(row, 1)?,
        tag_display: row.get(2)?,
        rating: row.get(3)?,
    })
}

impl Database {
    // -- Windowed leaderboards --

    /// Blind put of a leaderboard row.
    pub fn upsert_leaderboard(&self, row: &LeaderboardRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO leaderboard_rows (board, segment, photo_id, rating, posted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (board, segment, photo_id) DO UPDATE SET
                    rating = excluded.rating,
                    posted_at = excluded.posted_at",
                rusqlite::params![
                    row.window.as_str(),
                    row.segment.as_str(),
                    key(&row.photo_id),
                    row.rating,
                    ms(row.posted_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_leaderboard(&self, window: Window, segment: &Segment, photo_id: &Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM leaderboard_rows WHERE board = ?1 AND segment = ?2 AND photo_id = ?3",
                rusqlite::params![window.as_str(), segment.as_str(), key(photo_id)],
            )?;
            Ok(changed == 1)
        })
    }

    /// Removes a photo from every window.
    pub fn delete_leaderboard_rows_for_photo(&self, photo_id: &Uuid) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM leaderboard_rows WHERE photo_id = ?1",
                [key(photo_id)],
            )?;
            Ok(deleted)
        })
    }

    /// Rows by descending rating. `Segment::all()` reads across segments.
    pub fn leaderboard_top(
        &self,
        window: Window,
        segment: &Segment,
        limit: u32,
    ) -> Result<Vec<LeaderboardRow>> {
        self.with_conn(|conn| {
            let rows = if segment.is_all() {
                let mut stmt = conn.prepare(
                    "SELECT board, segment, photo_id, rating, posted_at FROM leaderboard_rows
                     WHERE board = ?1
                     ORDER BY rating DESC, photo_id ASC
                     LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![window.as_str(), limit], map_leaderboard_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            } else {
                let mut stmt = conn.prepare(
                    "SELECT board, segment, photo_id, rating, posted_at FROM leaderboard_rows
                     WHERE board = ?1 AND segment = ?2
                     ORDER BY rating DESC, photo_id ASC
                     LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(
                        rusqlite::params![window.as_str(), segment.as_str(), limit],
                        map_leaderboard_row,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            };
            Ok(rows)
        })
    }

    /// Every segment holding at least one row of `window`.
    pub fn leaderboard_segments(&self, window: Window) -> Result<Vec<Segment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT segment FROM leaderboard_rows WHERE board = ?1 ORDER BY segment",
            )?;
            let rows = stmt
                .query_map([window.as_str()], |row| {
                    row.get::<_, String>(0).map(Segment::from_raw)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Oldest-first scan of rows posted before `cutoff`.
    pub fn leaderboard_expired(
        &self,
        window: Window,
        segment: &Segment,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT photo_id FROM leaderboard_rows
                 WHERE board = ?1 AND segment = ?2 AND posted_at < ?3
                 ORDER BY posted_at ASC
                 LIMIT ?4",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![window.as_str(), segment.as_str(), ms(cutoff), limit],
                    |row| read_id(row, 0),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn leaderboard_len(&self, window: Window, segment: &Segment) -> Result<i64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM leaderboard_rows WHERE board = ?1 AND segment = ?2",
                rusqlite::params![window.as_str(), segment.as_str()],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }

    // -- Tag score index --

    pub fn upsert_tag_score(&self, row: &TagScoreRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO tag_scores (gender_tag, photo_id, tag_display, rating)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (gender_tag, photo_id) DO UPDATE SET
                    tag_display = excluded.tag_display,
                    rating = excluded.rating",
                rusqlite::params![row.gender_tag, key(&row.photo_id), row.tag_display, row.rating],
            )?;
            Ok(())
        })
    }

    pub fn delete_tag_scores_for_photo(&self, photo_id: &Uuid) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM tag_scores WHERE photo_id = ?1", [key(photo_id)])?;
            Ok(deleted)
        })
    }

    pub fn tag_scores_for_photo(&self, photo_id: &Uuid) -> Result<Vec<TagScoreRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT gender_tag, photo_id, tag_display, rating FROM tag_scores
                 WHERE photo_id = ?1 ORDER BY gender_tag",
            )?;
            let rows = stmt
                .query_map([key(photo_id)], map_tag_score)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn tag_top(&self, gender_tag: &str, limit: u32) -> Result<Vec<TagScoreRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT gender_tag, photo_id, tag_display, rating FROM tag_scores
                 WHERE gender_tag = ?1
                 ORDER BY rating DESC, photo_id ASC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![gender_tag, limit], map_tag_score)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
