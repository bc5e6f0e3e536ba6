use tracing::info;
use uuid::Uuid;

use faceoff_db::WinRow;
use faceoff_db::matches::Judgment;
use faceoff_types::event::ScoreEvent;
use faceoff_types::feed::FeedEvent;
use faceoff_types::ids::new_id;
use faceoff_types::models::{BRACKET_GAMES, BRACKET_SIZE, Side, Tournament};

use crate::score_log::shard_for;
use crate::{Engine, FaceoffError, Result};

/// Checks bracket votes against the seeds and returns the fourteen
/// intermediate winners followed by the champion.
///
/// Votes are the winners of the fifteen games in play order: the first round
/// pairs seeds 0v1, 2v3, ..., each later round pairs the previous round's
/// winners the same way.
pub fn score_bracket(seeds: &[Uuid], votes: &[Uuid]) -> Result<(Vec<Uuid>, Uuid)> {
    if seeds.len() != BRACKET_SIZE {
        return Err(FaceoffError::InvalidBracket(format!(
            "bracket has {} seeds",
            seeds.len()
        )));
    }
    if votes.len() != BRACKET_GAMES {
        return Err(FaceoffError::InvalidBracket(format!(
            "expected {BRACKET_GAMES} votes, got {}",
            votes.len()
        )));
    }

    let mut entrants: Vec<Uuid> = seeds.to_vec();
    let mut game = 0;
    while entrants.len() > 1 {
        let mut winners = Vec::with_capacity(entrants.len() / 2);
        for pair in entrants.chunks(2) {
            let vote = votes[game];
            if vote != pair[0] && vote != pair[1] {
                return Err(FaceoffError::InvalidBracket(format!(
                    "game {} was between {} and {}, not {vote}",
                    game + 1,
                    pair[0],
                    pair[1]
                )));
            }
            winners.push(vote);
            game += 1;
        }
        entrants = winners;
    }

    Ok((votes[..BRACKET_GAMES - 1].to_vec(), votes[BRACKET_GAMES - 1]))
}

impl Engine {
    /// Records the viewer's pick. The score event and the winner's Win row
    /// are committed with the verdict, so a second attempt leaves no trace.
    pub fn judge_match(&self, viewer_id: &Uuid, match_id: &Uuid, winner: Side) -> Result<()> {
        let retry = &self.config.retry;
        let record = retry
            .run("get_match", || self.db.get_match(match_id))?
            .filter(|m| m.viewer == *viewer_id)
            .ok_or(FaceoffError::NotFound("match"))?;
        if record.judged {
            return Err(FaceoffError::AlreadyJudged);
        }

        let a_won = winner == Side::A;
        let winning_photo = if a_won { record.photo_a } else { record.photo_b };
        let photo = self.get_photo(&winning_photo)?;
        let now = self.now();

        let event = ScoreEvent::new(record.photo_a, record.photo_b, record.viewer);
        let payload = event.encode();
        let win = WinRow {
            id: new_id(),
            user_id: photo.owner_id,
            photo_id: photo.id,
            match_id: record.id,
            viewer: record.viewer,
            created_at: now,
        };
        let judgment = Judgment {
            match_id: record.id,
            a_won,
            judged_at: now,
            shard: shard_for(&event, self.config.shards),
            event_payload: &payload,
            win: &win,
        };
        if !retry.run("record_judgment", || self.db.record_judgment(&judgment))? {
            return Err(FaceoffError::AlreadyJudged);
        }

        info!(viewer = %viewer_id, match_id = %match_id, winner = %photo.id, "match judged");
        self.feed.publish(FeedEvent::MatchWon {
            match_id: record.id,
            photo_id: photo.id,
            owner_id: photo.owner_id,
            viewer: record.viewer,
        });
        Ok(())
    }

    pub fn get_tournament(&self, viewer_id: &Uuid, tournament_id: &Uuid) -> Result<Tournament> {
        self.config
            .retry
            .run("get_tournament", || self.db.get_tournament(tournament_id))?
            .filter(|t| t.viewer == *viewer_id)
            .ok_or(FaceoffError::NotFound("tournament"))
    }

    /// Writes the whole bracket in one go. Ratings are not affected.
    pub fn judge_tournament(&self, viewer_id: &Uuid, tournament_id: &Uuid, votes: &[Uuid]) -> Result<()> {
        let tournament = self.get_tournament(viewer_id, tournament_id)?;
        if tournament.judged {
            return Err(FaceoffError::AlreadyJudged);
        }
        let (results, champion) = score_bracket(&tournament.seeds, votes)?;
        let now = self.now();

        let written = self.config.retry.run("judge_tournament", || {
            self.db.judge_tournament(tournament_id, &results, &champion, now)
        })?;
        if !written {
            return Err(FaceoffError::AlreadyJudged);
        }

        let photo = self.get_photo(&champion)?;
        info!(viewer = %viewer_id, tournament_id = %tournament_id, winner = %champion, "tournament judged");
        self.feed.publish(FeedEvent::TournamentWon {
            tournament_id: tournament.id,
            kind: tournament.kind,
            photo_id: photo.id,
            owner_id: photo.owner_id,
            viewer: tournament.viewer,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds() -> Vec<Uuid> {
        (1..=16).map(Uuid::from_u128).collect()
    }

    /// Lower-numbered seed wins every game.
    fn chalk(seeds: &[Uuid]) -> Vec<Uuid> {
        let mut votes = Vec::new();
        let mut entrants = seeds.to_vec();
        while entrants.len() > 1 {
            entrants = entrants.chunks(2).map(|p| p[0]).collect();
            votes.extend(entrants.iter().copied());
        }
        votes
    }

    #[test]
    fn chalk_bracket_crowns_top_seed() {
        let seeds = seeds();
        let votes = chalk(&seeds);
        assert_eq!(votes.len(), 15);
        let (results, champion) = score_bracket(&seeds, &votes).unwrap();
        assert_eq!(results.len(), 14);
        assert_eq!(champion, seeds[0]);
    }

    #[test]
    fn vote_for_a_non_entrant_is_rejected() {
        let seeds = seeds();
        let mut votes = chalk(&seeds);
        // Quarter-final 1 is seed 1 vs seed 3; seed 2 is already out.
        votes[8] = seeds[1];
        assert!(matches!(
            score_bracket(&seeds, &votes),
            Err(FaceoffError::InvalidBracket(_))
        ));
    }

    #[test]
    fn wrong_vote_count_is_rejected() {
        let seeds = seeds();
        let votes = chalk(&seeds);
        assert!(matches!(
            score_bracket(&seeds, &votes[..14]),
            Err(FaceoffError::InvalidBracket(_))
        ));
    }
}
