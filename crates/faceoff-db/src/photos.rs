use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use faceoff_types::models::{Photo, Segment};

use crate::{Database, OptionalExt, key, ms, read_id, read_parsed, read_time};

/// Separator for tags folded into one column by `group_concat`.
const TAG_SEP: char = '\u{1f}';

const PHOTO_COLUMNS: &str = "p.id, p.owner_id, p.segment, p.posted_at, p.media_kind, p.rating, p.phi, p.sigma,
     p.ready, p.is_test, p.duplicate_hash, p.bumped_once,
     (SELECT group_concat(t.tag_display, char(31)) FROM photo_tags t WHERE t.photo_id = p.id)";

fn map_photo(row: &Row<'_>) -> rusqlite::Result<Photo> {
    let segment: String = row.get(2)?;
    let tags: Option<String> = row.get(12)?;
    let mut tags: Vec<String> = tags
        .map(|s| s.split(TAG_SEP).map(str::to_string).collect())
        .unwrap_or_default();
    tags.sort();
    Ok(Photo {
        id: read_id(row, 0)?,
        owner_id: read_id(row, 1)?,
        segment: Segment::from_raw(segment),
        posted_at: read_time(row, 3)?,
        media_kind: read_parsed(row, 4)?,
        rating: row.get(5)?,
        phi: row.get(6)?,
        sigma: row.get(7)?,
        ready: row.get(8)?,
        is_test: row.get(9)?,
        duplicate_hash: row.get(10)?,
        bumped_once: row.get(11)?,
        tags,
    })
}

impl Database {
    /// Inserts a photo together with its tags.
    pub fn insert_photo(&self, photo: &Photo) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO photos (id, owner_id, segment, posted_at, media_kind, rating, phi, sigma,
                                     ready, is_test, duplicate_hash, bumped_once)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    key(&photo.id),
                    key(&photo.owner_id),
                    photo.segment.as_str(),
                    ms(photo.posted_at),
                    photo.media_kind.as_str(),
                    photo.rating,
                    photo.phi,
                    photo.sigma,
                    photo.ready,
                    photo.is_test,
                    photo.duplicate_hash,
                    photo.bumped_once,
                ],
            )?;
            for tag in &photo.tags {
                insert_tag(&tx, &photo.id, tag)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Attaches a tag. Returns false if the photo already carries it (in any case).
    pub fn add_photo_tag(&self, photo_id: &Uuid, tag: &str) -> Result<bool> {
        self.with_conn_mut(|conn| insert_tag(conn, photo_id, tag))
    }

    pub fn get_photo(&self, id: &Uuid) -> Result<Option<Photo>> {
        self.with_conn(|conn| query_photo(conn, id))
    }

    pub fn get_photos(&self, ids: &[Uuid]) -> Result<Vec<Photo>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {PHOTO_COLUMNS} FROM photos p WHERE p.id IN ({})",
                placeholders.join(", ")
            );
            let keys: Vec<String> = ids.iter().map(key).collect();
            let params: Vec<&dyn rusqlite::types::ToSql> = keys
                .iter()
                .map(|k| k as &dyn rusqlite::types::ToSql)
                .collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), map_photo)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Newest ready photos of a segment, newest first.
    pub fn recent_ready_photos(
        &self,
        segment: &Segment,
        limit: u32,
        include_test: bool,
    ) -> Result<Vec<Photo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PHOTO_COLUMNS} FROM photos p
                 WHERE p.segment = ?1 AND p.ready = 1 AND (?2 OR p.is_test = 0)
                 ORDER BY p.posted_at DESC, p.id DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![segment.as_str(), include_test, limit],
                    map_photo,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The owner's most recently posted ready photo.
    pub fn latest_ready_photo_of(&self, owner_id: &Uuid) -> Result<Option<Photo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PHOTO_COLUMNS} FROM photos p
                 WHERE p.owner_id = ?1 AND p.ready = 1
                 ORDER BY p.posted_at DESC, p.id DESC
                 LIMIT 1"
            ))?;
            let row = stmt.query_row([key(owner_id)], map_photo).optional()?;
            Ok(row)
        })
    }

    /// Ready photos by canonical rating, highest first. `Segment::all()` spans
    /// every segment.
    pub fn top_rated_photos(&self, segment: &Segment, limit: u32) -> Result<Vec<Photo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PHOTO_COLUMNS} FROM photos p
                 WHERE p.ready = 1 AND (?1 OR p.segment = ?2)
                 ORDER BY p.rating DESC, p.id ASC
                 LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![segment.is_all(), segment.as_str(), limit],
                    map_photo,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn find_photo_by_duplicate_hash(&self, hash: &[u8]) -> Result<Option<Photo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PHOTO_COLUMNS} FROM photos p WHERE p.duplicate_hash = ?1 LIMIT 1"
            ))?;
            let row = stmt.query_row([hash], map_photo).optional()?;
            Ok(row)
        })
    }

    pub fn set_photo_ready(&self, id: &Uuid, ready: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE photos SET ready = ?2 WHERE id = ?1",
                rusqlite::params![key(id), ready],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn mark_bumped(&self, id: &Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE photos SET bumped_once = 1 WHERE id = ?1",
                [key(id)],
            )?;
            Ok(changed == 1)
        })
    }

    /// Blind write of a photo's Glicko-2 triple.
    pub fn update_photo_rating(&self, id: &Uuid, rating: f64, phi: f64, sigma: f64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE photos SET rating = ?2, phi = ?3, sigma = ?4 WHERE id = ?1",
                rusqlite::params![key(id), rating, phi, sigma],
            )?;
            Ok(changed == 1)
        })
    }

    /// Test and seeding helper: overrides a photo's post time.
    pub fn set_photo_posted_at(&self, id: &Uuid, posted_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE photos SET posted_at = ?2 WHERE id = ?1",
                rusqlite::params![key(id), ms(posted_at)],
            )?;
            Ok(changed == 1)
        })
    }
}

fn insert_tag(conn: &Connection, photo_id: &Uuid, tag: &str) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO photo_tags (photo_id, tag_key, tag_display) VALUES (?1, ?2, ?3)",
        rusqlite::params![key(photo_id), tag.to_lowercase(), tag],
    )?;
    Ok(changed == 1)
}

fn query_photo(conn: &Connection, id: &Uuid) -> Result<Option<Photo>> {
    let mut stmt = conn.prepare(&format!("SELECT {PHOTO_COLUMNS} FROM photos p WHERE p.id = ?1"))?;
    let row = stmt.query_row([key(id)], map_photo).optional()?;
    Ok(row)
}
