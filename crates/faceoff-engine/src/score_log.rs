//! Score Event Log access: appending, cursor validation and per-shard reads.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use faceoff_db::{CursorRow, LoggedEvent};
use faceoff_types::event::ScoreEvent;
use faceoff_types::ids::pack_uuid;

use crate::{Engine, FaceoffError, Result};

/// Consumer name of the score processor.
pub const SCORE_STREAM: &str = "scores";

/// Partition of an event, derived from the low timestamp word of its first
/// photo.
pub fn shard_for(event: &ScoreEvent, shards: u32) -> u32 {
    let packed = pack_uuid(&event.photo_a);
    let word = u32::from_be_bytes([packed[4], packed[5], packed[6], packed[7]]);
    word % shards.max(1)
}

/// Why a stored cursor cannot be resumed from, if it can't.
pub fn check_cursor(
    shard: u32,
    cursor: &CursorRow,
    epoch: &str,
    high_water: i64,
) -> Result<()> {
    if cursor.epoch != epoch {
        return Err(FaceoffError::CorruptCursor {
            shard,
            reason: format!("written under log {} but log is now {epoch}", cursor.epoch),
        });
    }
    if cursor.last_seq > high_water || cursor.last_seq < 0 {
        return Err(FaceoffError::CorruptCursor {
            shard,
            reason: format!("position {} outside log (end {high_water})", cursor.last_seq),
        });
    }
    Ok(())
}

impl Engine {
    /// Appends an event outside of judging, e.g. when replaying matches.
    pub fn append_score_event(&self, event: &ScoreEvent, at: DateTime<Utc>) -> Result<i64> {
        let shard = shard_for(event, self.config.shards);
        let payload = event.encode();
        self.config
            .retry
            .run("append_event", || self.db.append_event(shard, &payload, at))
    }

    /// Where `stream` resumes in `shard`. A cursor the log rejects is logged
    /// and replaced with the start of the log.
    pub fn open_cursor(&self, stream: &str, shard: u32) -> Result<CursorRow> {
        let retry = &self.config.retry;
        let epoch = retry.run("log_epoch", || self.db.log_epoch())?;
        let stored = retry.run("load_cursor", || self.db.load_cursor(stream, shard))?;
        let Some(cursor) = stored else {
            return Ok(CursorRow { epoch, last_seq: 0 });
        };

        let high_water = retry.run("log_high_water", || self.db.log_high_water())?;
        match check_cursor(shard, &cursor, &epoch, high_water) {
            Ok(()) => Ok(cursor),
            Err(e) => {
                warn!(stream, shard, error = %e, "resetting consumer cursor to start of log");
                Ok(CursorRow { epoch, last_seq: 0 })
            }
        }
    }

    /// Next batch of `shard` strictly after `cursor`.
    pub fn read_score_events(&self, shard: u32, cursor: &CursorRow) -> Result<Vec<LoggedEvent>> {
        self.config.retry.run("read_events", || {
            self.db
                .read_events(shard, cursor.last_seq, self.config.score_batch)
        })
    }

    pub fn commit_cursor(&self, stream: &str, shard: u32, cursor: &CursorRow) -> Result<()> {
        let now = self.now();
        self.config
            .retry
            .run("save_cursor", || self.db.save_cursor(stream, shard, cursor, now))
    }

    /// Drops consumed events older than the retention window.
    pub fn prune_events(&self) -> Result<usize> {
        let before = self.now() - self.config.event_retention;
        let pruned = self
            .config
            .retry
            .run("prune_events", || self.db.prune_events(SCORE_STREAM, before))?;
        if pruned > 0 {
            info!(pruned, "pruned consumed score events");
        }
        Ok(pruned)
    }
}
