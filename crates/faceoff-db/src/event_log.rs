use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::{Database, OptionalExt, ms, read_time};

/// One entry of the score event log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedEvent {
    pub seq: i64,
    pub shard: u32,
    pub payload: Vec<u8>,
    pub appended_at: DateTime<Utc>,
}

/// A consumer's position in one shard of the log.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorRow {
    pub epoch: String,
    pub last_seq: i64,
}

pub(crate) fn insert_event(
    conn: &Connection,
    shard: u32,
    payload: &[u8],
    at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO score_events (shard, payload, appended_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![shard, payload, ms(at)],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    pub fn append_event(&self, shard: u32, payload: &[u8], at: DateTime<Utc>) -> Result<i64> {
        self.with_conn_mut(|conn| insert_event(conn, shard, payload, at))
    }

    /// Identifier of the current log incarnation.
    pub fn log_epoch(&self) -> Result<String> {
        self.with_conn(|conn| {
            let epoch: String =
                conn.query_row("SELECT epoch FROM score_log_meta WHERE id = 1", [], |r| r.get(0))?;
            Ok(epoch)
        })
    }

    /// Highest sequence number ever handed out, including pruned events.
    pub fn log_high_water(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let seq: Option<i64> = conn
                .query_row(
                    "SELECT seq FROM sqlite_sequence WHERE name = 'score_events'",
                    [],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(seq.unwrap_or(0))
        })
    }

    /// Events of `shard` strictly after `after_seq`, in order.
    pub fn read_events(&self, shard: u32, after_seq: i64, limit: u32) -> Result<Vec<LoggedEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, shard, payload, appended_at FROM score_events
                 WHERE shard = ?1 AND seq > ?2
                 ORDER BY seq
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![shard, after_seq, limit], |row| {
                    Ok(LoggedEvent {
                        seq: row.get(0)?,
                        shard: row.get(1)?,
                        payload: row.get(2)?,
                        appended_at: read_time(row, 3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_events(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM score_events", [], |r| r.get(0))?;
            Ok(n)
        })
    }

    pub fn load_cursor(&self, stream: &str, shard: u32) -> Result<Option<CursorRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT epoch, last_seq FROM consumer_cursors WHERE stream = ?1 AND shard = ?2",
                rusqlite::params![stream, shard],
                |row| {
                    Ok(CursorRow {
                        epoch: row.get(0)?,
                        last_seq: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn save_cursor(
        &self,
        stream: &str,
        shard: u32,
        cursor: &CursorRow,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO consumer_cursors (stream, shard, epoch, last_seq, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (stream, shard) DO UPDATE SET
                    epoch = excluded.epoch,
                    last_seq = excluded.last_seq,
                    updated_at = excluded.updated_at",
                rusqlite::params![stream, shard, cursor.epoch, cursor.last_seq, ms(at)],
            )?;
            Ok(())
        })
    }

    /// Drops every event and starts a new log epoch. Cursors written under the
    /// old epoch are no longer valid.
    pub fn replace_log(&self) -> Result<String> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM score_events", [])?;
            tx.execute(
                "UPDATE score_log_meta SET epoch = lower(hex(randomblob(16))) WHERE id = 1",
                [],
            )?;
            let epoch: String =
                tx.query_row("SELECT epoch FROM score_log_meta WHERE id = 1", [], |r| r.get(0))?;
            tx.commit()?;
            Ok(epoch)
        })
    }

    /// Deletes events older than `before` that every cursor of `stream` has
    /// already consumed. Shards without a cursor keep all their events.
    pub fn prune_events(&self, stream: &str, before: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM score_events
                 WHERE appended_at < ?2
                   AND seq <= (SELECT c.last_seq FROM consumer_cursors c
                               WHERE c.stream = ?1 AND c.shard = score_events.shard)",
                rusqlite::params![stream, ms(before)],
            )?;
            Ok(deleted)
        })
    }
}
