//! Match streams.
//!
//! A stream is produced by pulling candidate pairs from a [`PairSource`] and
//! running each through the pair checks until enough matches are accepted.
//! The source yields the viewer's bump pair first, then random pairs drawn
//! without replacement, alternating between the photo and movie buckets so
//! that a pair never mixes the two. A pair that fails the checks goes back
//! into the pool as photos, never again as that pair, so a stream only comes
//! up empty once every same-media pairing has been tried.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use tracing::{debug, info};
use uuid::Uuid;

use faceoff_rating::Rating;
use faceoff_types::api::{MatchView, StreamItem, TournamentView};
use faceoff_types::ids::{compare_ids, new_id};
use faceoff_types::models::{
    BRACKET_SIZE, CadenceState, MatchRecord, MediaKind, Photo, Segment, Tournament,
    TournamentKind, User, gender_tag,
};

use crate::cadence::{advance, due, record_match};
use crate::photos::clean_tag;
use crate::{Engine, FaceoffError, Result};

pub(crate) fn rating_of(photo: &Photo) -> Rating {
    Rating::new(photo.rating, photo.phi, photo.sigma)
}

fn bucket_of(kind: MediaKind) -> usize {
    match kind {
        MediaKind::Photo => 0,
        MediaKind::Movie => 1,
    }
}

/// A pair waiting for the pair checks.
#[derive(Debug)]
pub(crate) struct Candidate {
    pub first: Photo,
    pub second: Photo,
    pub bump: bool,
}

pub(crate) struct PairSource {
    bump: Option<(Photo, Photo)>,
    buckets: [Vec<Photo>; 2],
    turn: usize,
    /// Pairs handed back by [`PairSource::put_back`]; never offered again.
    tried: HashSet<(Uuid, Uuid)>,
}

fn pair_key(x: &Uuid, y: &Uuid) -> (Uuid, Uuid) {
    if x <= y { (*x, *y) } else { (*y, *x) }
}

impl PairSource {
    pub(crate) fn new(candidates: Vec<Photo>) -> Self {
        let (photos, movies): (Vec<Photo>, Vec<Photo>) = candidates
            .into_iter()
            .partition(|p| p.media_kind == MediaKind::Photo);
        Self {
            bump: None,
            buckets: [photos, movies],
            turn: 0,
            tried: HashSet::new(),
        }
    }

    /// Puts `own` at the head of the stream against a random candidate of the
    /// same media kind, which leaves the pool. False if there is no such
    /// candidate.
    pub(crate) fn bump(&mut self, own: Photo, rng: &mut StdRng) -> bool {
        let bucket = &mut self.buckets[bucket_of(own.media_kind)];
        if bucket.is_empty() {
            return false;
        }
        let partner = bucket.swap_remove(rng.random_range(0..bucket.len()));
        self.bump = Some((own, partner));
        true
    }

    /// Photos still available, counting the bump pair.
    pub(crate) fn remaining(&self) -> usize {
        let bump = if self.bump.is_some() { 2 } else { 0 };
        bump + self.buckets.iter().map(Vec::len).sum::<usize>()
    }

    /// Next pair to check, the bump pair first. Both photos leave the pool
    /// until handed back with [`PairSource::put_back`].
    pub(crate) fn next_pair(&mut self, rng: &mut StdRng) -> Option<Candidate> {
        if let Some((first, second)) = self.bump.take() {
            return Some(Candidate {
                first,
                second,
                bump: true,
            });
        }
        for _ in 0..self.buckets.len() {
            let idx = self.turn;
            self.turn = (self.turn + 1) % self.buckets.len();
            if let Some(candidate) = self.draw(idx, rng) {
                return Some(candidate);
            }
        }
        None
    }

    /// Returns a rejected pair's photos to the pool. The pair itself is
    /// remembered so it is not drawn again; the photos may still meet others.
    pub(crate) fn put_back(&mut self, candidate: Candidate) {
        let Candidate { first, second, bump } = candidate;
        if bump {
            // The viewer's own photo was never in the pool.
            self.buckets[bucket_of(second.media_kind)].push(second);
            return;
        }
        self.tried.insert(pair_key(&first.id, &second.id));
        let idx = bucket_of(first.media_kind);
        self.buckets[idx].push(first);
        self.buckets[idx].push(second);
    }

    /// A random untried pair from one bucket. A photo with no untried partner
    /// left is dropped for the rest of the call.
    fn draw(&mut self, idx: usize, rng: &mut StdRng) -> Option<Candidate> {
        let bucket = &mut self.buckets[idx];
        while bucket.len() >= 2 {
            let i = rng.random_range(0..bucket.len());
            let first_id = bucket[i].id;
            let mut partners: Vec<usize> = (0..bucket.len()).filter(|&j| j != i).collect();
            partners.shuffle(rng);
            let Some(j) = partners
                .into_iter()
                .find(|&j| !self.tried.contains(&pair_key(&first_id, &bucket[j].id)))
            else {
                bucket.swap_remove(i);
                continue;
            };

            let p = bucket.swap_remove(i.max(j));
            let q = bucket.swap_remove(i.min(j));
            let (first, second) = if p.id == first_id { (p, q) } else { (q, p) };
            return Some(Candidate {
                first,
                second,
                bump: false,
            });
        }
        None
    }
}

fn match_view(record: &MatchRecord) -> MatchView {
    MatchView {
        match_id: record.id,
        photo_a: record.photo_a,
        photo_b: record.photo_b,
        a_win_delta: record.a_win_delta,
        a_lose_delta: record.a_lose_delta,
        b_win_delta: record.b_win_delta,
        b_lose_delta: record.b_lose_delta,
    }
}

impl Engine {
    /// Up to `stream_len` entries for `viewer_id`: regular matches, possibly
    /// ending with one tournament.
    pub fn get_match_stream(&self, viewer_id: &Uuid, reset_cadence: bool) -> Result<Vec<StreamItem>> {
        let viewer = self.load_user(viewer_id)?;
        let now = self.now();
        let mut cadence = if reset_cadence {
            debug!(viewer = %viewer.id, "cadence reset by request");
            CadenceState::initial(now)
        } else {
            self.cadence_state(&viewer.id)?
        };

        let segment = self.config.segments.view_segment(&viewer);
        let candidates = self.segment_pool(&viewer, &segment)?;
        let mut rng = self.rng();
        let mut source = PairSource::new(candidates.clone());
        self.stage_bump(&viewer, &mut source, &mut rng, |own| own.segment == segment)?;

        if source.remaining() < 2 {
            if reset_cadence {
                self.save_cadence(&viewer.id, &cadence)?;
            }
            return Err(FaceoffError::InsufficientPool);
        }

        let mut items = Vec::with_capacity(self.config.stream_len);
        let mut short_of_seeds = false;
        while items.len() < self.config.stream_len {
            if let Some(kind) = due(&cadence) {
                if !short_of_seeds {
                    match self.seed_tournament(&viewer, kind, &segment, &candidates, now, &mut rng)? {
                        Some(view) => {
                            advance(&mut cadence);
                            items.push(StreamItem::Tournament(view));
                            break;
                        }
                        None => short_of_seeds = true,
                    }
                }
            }

            let Some(candidate) = source.next_pair(&mut rng) else {
                break;
            };
            let Some(view) = self.accept_pair(&viewer, &candidate.first, &candidate.second, now)? else {
                source.put_back(candidate);
                continue;
            };
            if candidate.bump {
                let own = candidate.first.id;
                self.config
                    .retry
                    .run("mark_bumped", || self.db.mark_bumped(&own))?;
            }
            record_match(&mut cadence);
            items.push(StreamItem::Match(view));
        }

        cadence.last_touched = now;
        self.save_cadence(&viewer.id, &cadence)?;

        if items.is_empty() {
            return Err(FaceoffError::InsufficientPool);
        }
        info!(
            viewer = %viewer.id,
            items = items.len(),
            countdown = cadence.matches_until_next_tournament,
            "match stream built"
        );
        Ok(items)
    }

    /// Like [`Engine::get_match_stream`] but the pool is the top of a tag
    /// index. Never fires tournaments and leaves cadence alone.
    pub fn get_tag_match_stream(&self, viewer_id: &Uuid, tag: &str) -> Result<Vec<MatchView>> {
        let tag = clean_tag(tag)?;
        let viewer = self.load_user(viewer_id)?;
        let now = self.now();
        let key = gender_tag(self.config.segments.view_gender(&viewer), tag);

        let retry = &self.config.retry;
        let rows = retry.run("tag_top", || self.db.tag_top(&key, self.config.pool_size))?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.photo_id).collect();
        let candidates: Vec<Photo> = retry
            .run("get_photos", || self.db.get_photos(&ids))?
            .into_iter()
            .filter(|p| p.ready && p.owner_id != viewer.id && (viewer.is_test || !p.is_test))
            .collect();

        let mut rng = self.rng();
        let mut source = PairSource::new(candidates);
        self.stage_bump(&viewer, &mut source, &mut rng, |own| own.has_tag(tag))?;
        if source.remaining() < 2 {
            return Err(FaceoffError::InsufficientPool);
        }

        let mut items = Vec::with_capacity(self.config.stream_len);
        while items.len() < self.config.stream_len {
            let Some(candidate) = source.next_pair(&mut rng) else {
                break;
            };
            let Some(view) = self.accept_pair(&viewer, &candidate.first, &candidate.second, now)? else {
                source.put_back(candidate);
                continue;
            };
            if candidate.bump {
                let own = candidate.first.id;
                retry.run("mark_bumped", || self.db.mark_bumped(&own))?;
            }
            items.push(view);
        }

        if items.is_empty() {
            return Err(FaceoffError::InsufficientPool);
        }
        debug!(viewer = %viewer.id, tag = %key, items = items.len(), "tag stream built");
        Ok(items)
    }

    /// One fresh opponent for a specific photo.
    pub fn get_match_for(&self, viewer_id: &Uuid, photo_id: &Uuid) -> Result<MatchView> {
        let viewer = self.load_user(viewer_id)?;
        let photo = self
            .config
            .retry
            .run("get_photo", || self.db.get_photo(photo_id))?
            .filter(|p| p.ready)
            .ok_or(FaceoffError::PhotoNotFound(*photo_id))?;
        let now = self.now();

        let mut opponents: Vec<Photo> = self
            .segment_pool(&viewer, &photo.segment)?
            .into_iter()
            .filter(|p| {
                p.id != photo.id
                    && p.owner_id != photo.owner_id
                    && p.media_kind == photo.media_kind
            })
            .collect();
        opponents.shuffle(&mut self.rng());

        for opponent in opponents {
            if let Some(view) = self.accept_pair(&viewer, &photo, &opponent, now)? {
                return Ok(view);
            }
        }
        Err(FaceoffError::NoOpponent(*photo_id))
    }

    /// Most recent ready photos of `segment` the viewer may be shown: not
    /// their own, and no test photos unless the viewer is a test user.
    fn segment_pool(&self, viewer: &User, segment: &Segment) -> Result<Vec<Photo>> {
        let pool = self.config.retry.run("recent_ready_photos", || {
            self.db
                .recent_ready_photos(segment, self.config.pool_size, viewer.is_test)
        })?;
        Ok(pool.into_iter().filter(|p| p.owner_id != viewer.id).collect())
    }

    fn stage_bump(
        &self,
        viewer: &User,
        source: &mut PairSource,
        rng: &mut StdRng,
        eligible: impl Fn(&Photo) -> bool,
    ) -> Result<()> {
        let own = self
            .config
            .retry
            .run("latest_ready_photo_of", || self.db.latest_ready_photo_of(&viewer.id))?;
        match own {
            Some(own) if !own.bumped_once && eligible(&own) => {
                let photo_id = own.id;
                if source.bump(own, rng) {
                    debug!(viewer = %viewer.id, photo_id = %photo_id, "bump slot staged");
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Runs the pair checks and, if the pair passes, records the match.
    /// `None` means the pair was dropped.
    fn accept_pair(
        &self,
        viewer: &User,
        x: &Photo,
        y: &Photo,
        now: DateTime<Utc>,
    ) -> Result<Option<MatchView>> {
        if x.owner_id == y.owner_id {
            return Ok(None);
        }
        let (a, b) = match compare_ids(&x.id, &y.id) {
            Ordering::Greater => (y, x),
            Ordering::Less => (x, y),
            Ordering::Equal => return Ok(None),
        };

        let retry = &self.config.retry;
        if retry.run("match_exists", || self.db.match_exists(&a.id, &b.id, &viewer.id))? {
            return Ok(None);
        }

        let deltas = self.config.glicko.predict_pair(rating_of(a), rating_of(b))?;
        let record = MatchRecord {
            id: new_id(),
            photo_a: a.id,
            photo_b: b.id,
            viewer: viewer.id,
            proposed_at: now,
            judged: false,
            judged_at: None,
            scored_at: None,
            a_won: None,
            a_win_delta: deltas.a_win,
            a_lose_delta: deltas.a_lose,
            b_win_delta: deltas.b_win,
            b_lose_delta: deltas.b_lose,
        };
        // Another request may have recorded the pair since the check above.
        if !retry.run("insert_match", || self.db.insert_match(&record))? {
            return Ok(None);
        }
        Ok(Some(match_view(&record)))
    }

    fn seed_tournament(
        &self,
        viewer: &User,
        kind: TournamentKind,
        segment: &Segment,
        pool: &[Photo],
        now: DateTime<Utc>,
        rng: &mut StdRng,
    ) -> Result<Option<TournamentView>> {
        // TODO: regional and global brackets should draw from a cross-segment
        // pool once its rules are settled; all kinds use the local pool for now.
        if pool.len() < BRACKET_SIZE {
            debug!(viewer = %viewer.id, pool = pool.len(), kind = kind.as_str(), "tournament due but pool too small");
            return Ok(None);
        }
        let seeds: Vec<Uuid> = pool.choose_multiple(rng, BRACKET_SIZE).map(|p| p.id).collect();
        let tournament = Tournament {
            id: new_id(),
            viewer: viewer.id,
            kind,
            segment: segment.clone(),
            seeds,
            results: Vec::new(),
            winner: None,
            created_at: now,
            judged: false,
            judged_at: None,
        };
        self.config
            .retry
            .run("insert_tournament", || self.db.insert_tournament(&tournament))?;
        info!(viewer = %viewer.id, tournament_id = %tournament.id, kind = kind.as_str(), "tournament seeded");
        Ok(Some(TournamentView {
            tournament_id: tournament.id,
            kind,
            seeds: tournament.seeds,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn photo(n: u128, owner: u128, kind: MediaKind) -> Photo {
        Photo {
            id: Uuid::from_u128(n),
            owner_id: Uuid::from_u128(owner),
            segment: Segment::from_raw("f0"),
            posted_at: Utc::now(),
            media_kind: kind,
            rating: 1500.0,
            phi: 350.0,
            sigma: 0.006,
            ready: true,
            is_test: false,
            duplicate_hash: None,
            bumped_once: false,
            tags: Vec::new(),
        }
    }

    fn drain(source: &mut PairSource, rng: &mut StdRng) -> Vec<Candidate> {
        std::iter::from_fn(|| source.next_pair(rng)).collect()
    }

    #[test]
    fn pairs_never_mix_media_and_never_repeat_a_photo() {
        let mut pool: Vec<Photo> = (1..=6).map(|n| photo(n, n, MediaKind::Photo)).collect();
        pool.extend((7..=10).map(|n| photo(n, n, MediaKind::Movie)));
        let mut source = PairSource::new(pool);
        let mut rng = StdRng::seed_from_u64(7);

        let pairs = drain(&mut source, &mut rng);
        assert_eq!(pairs.len(), 5);
        let mut seen = std::collections::HashSet::new();
        for c in &pairs {
            assert_eq!(c.first.media_kind, c.second.media_kind);
            assert!(seen.insert(c.first.id));
            assert!(seen.insert(c.second.id));
            assert!(!c.bump);
        }
        // Buckets alternate while both have photos left.
        assert_eq!(pairs[0].first.media_kind, MediaKind::Photo);
        assert_eq!(pairs[1].first.media_kind, MediaKind::Movie);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn bump_pair_comes_first_with_same_media_partner() {
        let pool = vec![
            photo(1, 1, MediaKind::Photo),
            photo(2, 2, MediaKind::Movie),
            photo(3, 3, MediaKind::Movie),
        ];
        let mut source = PairSource::new(pool);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(source.bump(photo(99, 50, MediaKind::Movie), &mut rng));
        assert_eq!(source.remaining(), 4);

        let first = source.next_pair(&mut rng).unwrap();
        assert!(first.bump);
        assert_eq!(first.first.id, Uuid::from_u128(99));
        assert_eq!(first.second.media_kind, MediaKind::Movie);
        // One movie and one photo left: no further pair possible.
        assert!(source.next_pair(&mut rng).is_none());
    }

    #[test]
    fn rejected_pair_returns_its_photos_but_not_itself() {
        let pool: Vec<Photo> = (1..=3).map(|n| photo(n, n, MediaKind::Photo)).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let mut source = PairSource::new(pool);
        let mut offered = std::collections::HashSet::new();

        // Reject everything: each of the three pairings comes up exactly once.
        while let Some(c) = source.next_pair(&mut rng) {
            assert!(offered.insert(pair_key(&c.first.id, &c.second.id)), "pair offered twice");
            source.put_back(c);
        }
        assert_eq!(offered.len(), 3);
    }

    #[test]
    fn rejected_bump_keeps_partner_in_pool() {
        let pool = vec![photo(1, 1, MediaKind::Photo), photo(2, 2, MediaKind::Photo)];
        let mut rng = StdRng::seed_from_u64(5);
        let mut source = PairSource::new(pool);
        assert!(source.bump(photo(99, 50, MediaKind::Photo), &mut rng));

        let bump = source.next_pair(&mut rng).unwrap();
        assert!(bump.bump);
        source.put_back(bump);
        assert_eq!(source.remaining(), 2);

        let next = source.next_pair(&mut rng).unwrap();
        assert!(!next.bump);
        assert_eq!(
            pair_key(&next.first.id, &next.second.id),
            (Uuid::from_u128(1), Uuid::from_u128(2))
        );
    }

    #[test]
    fn bump_without_partner_is_skipped() {
        let mut source = PairSource::new(vec![photo(1, 1, MediaKind::Photo)]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!source.bump(photo(99, 50, MediaKind::Movie), &mut rng));
        assert!(source.next_pair(&mut rng).is_none());
    }
}
