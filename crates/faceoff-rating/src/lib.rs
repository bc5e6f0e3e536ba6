/// faceoff-rating: Glicko-2 skill ratings for head-to-head photo matches.
///
/// Pure computation. A subject's triple `(rating, phi, sigma)` is updated from
/// every result it collected during one rating period, and the same kernel is
/// used to predict the rating swing shown next to a proposed pair.
pub mod glicko2;
pub mod predict;

pub use glicko2::{Glicko2, Opponent, Outcome, Rating, RatingError};
pub use predict::PredictedDeltas;
