use serde::{Deserialize, Serialize};

use crate::glicko2::{Glicko2, Opponent, Outcome, Rating, RatingError};

/// Signed rating changes shown next to a proposed pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedDeltas {
    pub a_win: f64,
    pub a_lose: f64,
    pub b_win: f64,
    pub b_lose: f64,
}

impl Glicko2 {
    /// Change in `subject`'s rating if a single-result period against
    /// `opponent` ended in `outcome`.
    pub fn predict(
        &self,
        subject: Rating,
        opponent: Rating,
        outcome: Outcome,
    ) -> Result<f64, RatingError> {
        let next = self.rate(subject, &[Opponent::new(outcome, opponent)])?;
        Ok(next.rating - subject.rating)
    }

    pub fn predict_pair(&self, a: Rating, b: Rating) -> Result<PredictedDeltas, RatingError> {
        Ok(PredictedDeltas {
            a_win: self.predict(a, b, Outcome::Win)?,
            a_lose: self.predict(a, b, Outcome::Loss)?,
            b_win: self.predict(b, a, Outcome::Win)?,
            b_lose: self.predict(b, a, Outcome::Loss)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_is_positive_loss_is_negative() {
        let system = Glicko2::default();
        let a = Rating::new(1710.0, 90.0, 0.006);
        let b = Rating::new(1420.0, 240.0, 0.006);

        let d = system.predict_pair(a, b).unwrap();
        assert!(d.a_win > 0.0);
        assert!(d.a_lose < 0.0);
        assert!(d.b_win > 0.0);
        assert!(d.b_lose < 0.0);
        // The favourite has less to gain than the underdog.
        assert!(d.a_win < d.b_win);
    }

    #[test]
    fn equal_photos_have_mirrored_deltas() {
        let system = Glicko2::default();
        let d = system
            .predict_pair(Rating::default(), Rating::default())
            .unwrap();
        assert!((d.a_win + d.a_lose).abs() < 1e-9);
        assert!((d.a_win - d.b_win).abs() < 1e-9);
    }

    #[test]
    fn invalid_input_propagates() {
        let system = Glicko2::default();
        let broken = Rating::new(1500.0, -1.0, 0.006);
        assert!(system.predict_pair(broken, Rating::default()).is_err());
    }
}
