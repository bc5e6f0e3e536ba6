use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use faceoff_types::models::{CadenceState, TournamentKind};

use crate::{Engine, Result};

/// State as of `now`: anything idle for longer than `idle` starts over.
pub fn refresh(state: CadenceState, now: DateTime<Utc>, idle: Duration) -> CadenceState {
    if now - state.last_touched > idle {
        CadenceState::initial(now)
    } else {
        state
    }
}

/// The tournament kind that is due, if the countdown has run out.
pub fn due(state: &CadenceState) -> Option<TournamentKind> {
    (state.matches_until_next_tournament == 0).then_some(state.next_tournament_kind)
}

/// One regular match was accepted.
pub fn record_match(state: &mut CadenceState) {
    state.matches_until_next_tournament = state.matches_until_next_tournament.saturating_sub(1);
}

/// A tournament of the due kind was handed out.
pub fn advance(state: &mut CadenceState) {
    let (next, countdown) = state.next_tournament_kind.successor();
    state.next_tournament_kind = next;
    state.matches_until_next_tournament = countdown;
}

impl Engine {
    /// The viewer's cadence as of now, after any idle reset.
    pub fn cadence_state(&self, viewer: &Uuid) -> Result<CadenceState> {
        let now = self.now();
        let stored = self
            .config
            .retry
            .run("load_cadence", || self.db.load_cadence(viewer))?;
        Ok(match stored {
            Some(state) => {
                let fresh = refresh(state, now, self.config.cadence_idle);
                if fresh != state {
                    debug!(viewer = %viewer, "cadence reset after inactivity");
                }
                fresh
            }
            None => CadenceState::initial(now),
        })
    }

    pub(crate) fn save_cadence(&self, viewer: &Uuid, state: &CadenceState) -> Result<()> {
        self.config
            .retry
            .run("save_cadence", || self.db.save_cadence(viewer, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_matches_then_local_then_regional_countdown() {
        let now = Utc::now();
        let mut state = CadenceState::initial(now);
        for _ in 0..10 {
            assert_eq!(due(&state), None);
            record_match(&mut state);
        }
        assert_eq!(due(&state), Some(TournamentKind::Local));
        advance(&mut state);
        assert_eq!(state.matches_until_next_tournament, 8);
        assert_eq!(state.next_tournament_kind, TournamentKind::Regional);
    }

    #[test]
    fn full_cycle_returns_to_local() {
        let mut state = CadenceState::initial(Utc::now());
        state.matches_until_next_tournament = 0;
        advance(&mut state);
        advance(&mut state);
        advance(&mut state);
        assert_eq!(state.next_tournament_kind, TournamentKind::Local);
        assert_eq!(state.matches_until_next_tournament, 10);
    }

    #[test]
    fn counter_does_not_wrap() {
        let mut state = CadenceState::initial(Utc::now());
        state.matches_until_next_tournament = 0;
        record_match(&mut state);
        assert_eq!(state.matches_until_next_tournament, 0);
    }

    #[test]
    fn idle_state_resets() {
        let then = Utc::now();
        let mut state = CadenceState::initial(then);
        state.matches_until_next_tournament = 3;
        state.next_tournament_kind = TournamentKind::Global;

        let idle = Duration::hours(1);
        assert_eq!(refresh(state, then + Duration::minutes(59), idle), state);

        let later = then + Duration::minutes(61);
        assert_eq!(refresh(state, later, idle), CadenceState::initial(later));
    }
}
