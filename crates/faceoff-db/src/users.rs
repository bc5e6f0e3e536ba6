use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use faceoff_types::models::User;

use crate::{Database, OptionalExt, key, ms, read_id, read_parsed, read_time};

/// A match win credited to the owner of the winning photo.
#[derive(Debug, Clone, PartialEq)]
pub struct WinRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub photo_id: Uuid,
    pub match_id: Uuid,
    pub viewer: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Database {
    // -- Users --

    pub fn insert_user(&self, user: &User, created_at: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, gender, view_gender, location_id, is_test, win_count, loss_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    key(&user.id),
                    user.gender.code().to_string(),
                    user.view_gender.code().to_string(),
                    user.location_id.to_string(),
                    user.is_test,
                    user.win_count,
                    user.loss_count,
                    ms(created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// Adds a batch's wins and losses to a user's running totals.
    pub fn add_results(&self, user_id: &Uuid, wins: i64, losses: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET win_count = win_count + ?2, loss_count = loss_count + ?3 WHERE id = ?1",
                rusqlite::params![key(user_id), wins, losses],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Wins --

    pub fn wins_for_user(&self, user_id: &Uuid, limit: u32) -> Result<Vec<WinRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, photo_id, match_id, viewer, created_at
                 FROM wins WHERE user_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![key(user_id), limit], |row| {
                    Ok(WinRow {
                        id: read_id(row, 0)?,
                        user_id: read_id(row, 1)?,
                        photo_id: read_id(row, 2)?,
                        match_id: read_id(row, 3)?,
                        viewer: read_id(row, 4)?,
                        created_at: read_time(row, 5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_wins_for_match(&self, match_id: &Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM wins WHERE match_id = ?1",
                [key(match_id)],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }
}

pub(crate) fn insert_win(conn: &Connection, win: &WinRow) -> Result<()> {
    conn.execute(
        "INSERT INTO wins (id, user_id, photo_id, match_id, viewer, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            key(&win.id),
            key(&win.user_id),
            key(&win.photo_id),
            key(&win.match_id),
            key(&win.viewer),
            ms(win.created_at),
        ],
    )?;
    Ok(())
}

fn query_user(conn: &Connection, id: &Uuid) -> Result<Option<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, gender, view_gender, location_id, is_test, win_count, loss_count
         FROM users WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([key(id)], |row| {
            let location: String = row.get(3)?;
            Ok(User {
                id: read_id(row, 0)?,
                gender: read_parsed(row, 1)?,
                view_gender: read_parsed(row, 2)?,
                location_id: location.parse().map_err(|e: uuid::Error| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                is_test: row.get(4)?,
                win_count: row.get(5)?,
                loss_count: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}
