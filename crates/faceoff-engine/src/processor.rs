//! Score Processor: turns judged matches into rating updates.
//!
//! Each batch read from a shard is one Glicko-2 rating period. Every photo
//! with results in the batch is rated once against all of its opponents, with
//! opponents taken at their pre-batch ratings. Leaderboard and tag rows for a
//! photo are written right after its rating, in the same pass.
//!
//! A store failure confined to one photo or match is logged and skipped so the
//! rest of the batch still lands and the cursor moves on. Only a store that
//! stays busy through every retry stops the tick.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use faceoff_db::LoggedEvent;
use faceoff_rating::{Opponent, Outcome};
use faceoff_types::api::ScoreTickReport;
use faceoff_types::event::ScoreEvent;
use faceoff_types::models::{LeaderboardRow, MatchRecord, Photo, Window};

use crate::proposer::rating_of;
use crate::score_log::SCORE_STREAM;
use crate::{Engine, FaceoffError, Result};

/// Results a photo collected in one batch, from its side.
type Period = HashMap<Uuid, Vec<(Uuid, Outcome)>>;

impl Engine {
    /// Drains every shard until it is empty or the tick's budget runs out.
    /// The cursor is committed after each batch.
    pub fn run_score_tick(&self) -> Result<ScoreTickReport> {
        let started = self.now();
        let budget = Duration::from_std(self.config.score_budget).unwrap_or(Duration::MAX);
        let deadline = started.checked_add_signed(budget).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut report = ScoreTickReport::default();

        'shards: for shard in 0..self.config.shards.max(1) {
            let mut cursor = self.open_cursor(SCORE_STREAM, shard)?;
            loop {
                let batch = self.read_score_events(shard, &cursor)?;
                let Some(last) = batch.last() else {
                    break;
                };
                let last_seq = last.seq;

                self.apply_batch(shard, &batch, &mut report)?;
                cursor.last_seq = last_seq;
                self.commit_cursor(SCORE_STREAM, shard, &cursor)?;

                if self.now() >= deadline {
                    report.budget_exhausted = true;
                    warn!(shard, "score tick budget exhausted, stopping at batch boundary");
                    break 'shards;
                }
            }
        }

        info!(
            seen = report.events_seen,
            applied = report.events_applied,
            skipped = report.events_skipped,
            photos = report.photos_updated,
            "score tick finished"
        );
        Ok(report)
    }

    fn apply_batch(&self, shard: u32, batch: &[LoggedEvent], report: &mut ScoreTickReport) -> Result<()> {
        let retry = &self.config.retry;
        let now = self.now();
        report.events_seen += batch.len();

        let mut seen = HashSet::new();
        let mut accepted: Vec<MatchRecord> = Vec::new();
        for logged in batch {
            let event = match ScoreEvent::decode(&logged.payload) {
                Ok(event) => event,
                Err(e) => {
                    let err = FaceoffError::CorruptEvent {
                        seq: logged.seq,
                        reason: e.to_string(),
                    };
                    warn!(shard, error = %err, "skipping score event");
                    report.events_skipped += 1;
                    continue;
                }
            };
            if !seen.insert(event) {
                debug!(shard, seq = logged.seq, "duplicate event in batch");
                report.events_skipped += 1;
                continue;
            }

            let record = retry.run("get_match_by_key", || {
                self.db
                    .get_match_by_key(&event.photo_a, &event.photo_b, &event.viewer)
            })?;
            match record {
                Some(m) if m.judged && m.scored_at.is_none() => accepted.push(m),
                Some(m) if m.scored_at.is_some() => {
                    debug!(shard, seq = logged.seq, match_id = %m.id, "match already scored");
                    report.events_skipped += 1;
                }
                other => {
                    warn!(
                        shard,
                        seq = logged.seq,
                        found = other.is_some(),
                        "score event has no judged match"
                    );
                    report.events_skipped += 1;
                }
            }
        }
        if accepted.is_empty() {
            return Ok(());
        }

        let mut period: Period = HashMap::new();
        for m in &accepted {
            if let Some((winner, loser)) = m.outcome() {
                period.entry(winner).or_default().push((loser, Outcome::Win));
                period.entry(loser).or_default().push((winner, Outcome::Loss));
            }
        }

        let ids: Vec<Uuid> = period.keys().copied().collect();
        let photos: HashMap<Uuid, Photo> = retry
            .run("get_photos", || self.db.get_photos(&ids))?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        for (photo_id, results) in &period {
            let Some(photo) = photos.get(photo_id) else {
                warn!(shard, photo_id = %photo_id, "rated photo is missing");
                continue;
            };
            let opponents: Vec<Opponent> = results
                .iter()
                .filter_map(|(opp, outcome)| {
                    photos.get(opp).map(|o| Opponent::new(*outcome, rating_of(o)))
                })
                .collect();

            let next = match self.config.glicko.rate(rating_of(photo), &opponents) {
                Ok(next) => next,
                Err(e) => {
                    warn!(shard, photo_id = %photo_id, error = %e, "skipping rating update");
                    continue;
                }
            };

            let mut updated = photo.clone();
            updated.rating = next.rating;
            updated.phi = next.phi;
            updated.sigma = next.sigma;
            match self.write_rating(&updated, now) {
                Ok(()) => report.photos_updated += 1,
                Err(e @ FaceoffError::TransientStore { .. }) => return Err(e),
                Err(e) => warn!(shard, photo_id = %photo_id, error = %e, "rating write failed, photo skipped"),
            }
        }

        let mut tallies: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for m in &accepted {
            // Strictly after judging even if the clock stalls.
            let scored_at = match m.judged_at {
                Some(judged_at) if judged_at >= now => judged_at + Duration::milliseconds(1),
                _ => now,
            };
            let marked = retry.run("mark_scored", || {
                self.db.mark_scored(&m.photo_a, &m.photo_b, &m.viewer, scored_at)
            });
            match marked {
                Ok(_) => report.events_applied += 1,
                Err(e @ FaceoffError::TransientStore { .. }) => return Err(e),
                Err(e) => {
                    warn!(shard, match_id = %m.id, error = %e, "mark_scored failed, match skipped");
                    report.events_skipped += 1;
                    continue;
                }
            }

            if let Some((winner, loser)) = m.outcome() {
                if let Some(owner) = photos.get(&winner).map(|p| p.owner_id) {
                    tallies.entry(owner).or_default().0 += 1;
                }
                if let Some(owner) = photos.get(&loser).map(|p| p.owner_id) {
                    tallies.entry(owner).or_default().1 += 1;
                }
            }
        }

        for (owner, (wins, losses)) in tallies {
            retry.run("add_results", || self.db.add_results(&owner, wins, losses))?;
        }

        info!(shard, events = batch.len(), matches = accepted.len(), photos = period.len(), "score batch applied");
        Ok(())
    }

    /// Writes a new triple to the photo and pushes it to every leaderboard
    /// window the photo is in and every tag it carries.
    fn write_rating(&self, photo: &Photo, now: DateTime<Utc>) -> Result<()> {
        let retry = &self.config.retry;
        retry.run("update_photo_rating", || {
            self.db
                .update_photo_rating(&photo.id, photo.rating, photo.phi, photo.sigma)
        })?;
        if !photo.ready {
            return Ok(());
        }

        for window in Window::ALL {
            if !window.contains(photo.posted_at, now) {
                continue;
            }
            let row = LeaderboardRow {
                window,
                segment: photo.segment.clone(),
                photo_id: photo.id,
                rating: photo.rating,
                posted_at: photo.posted_at,
            };
            retry.run("upsert_leaderboard", || self.db.upsert_leaderboard(&row))?;
        }
        for tag in &photo.tags {
            self.write_tag_score(photo, tag)?;
        }
        Ok(())
    }
}
