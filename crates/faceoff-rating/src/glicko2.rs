use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Conversion factor between the Glicko and Glicko-2 scales.
pub const SCALE: f64 = 173.7178;
pub const BASE_RATING: f64 = 1500.0;

pub const DEFAULT_TAU: f64 = 0.2;
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Upper bound on volatility iterations. The Illinois update converges in a
/// handful of steps for any sane input.
const MAX_ITERATIONS: usize = 200;

#[derive(Debug, Error, PartialEq)]
pub enum RatingError {
    #[error("invalid rating: {0}")]
    InvalidRating(String),
}

/// A Glicko-2 triple on the public (1500-centred) scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub rating: f64,
    pub phi: f64,
    pub sigma: f64,
}

impl Rating {
    pub fn new(rating: f64, phi: f64, sigma: f64) -> Self {
        Self { rating, phi, sigma }
    }

    fn validate(&self, who: &str) -> Result<(), RatingError> {
        if !self.rating.is_finite() || !self.phi.is_finite() || !self.sigma.is_finite() {
            return Err(RatingError::InvalidRating(format!(
                "{who} has a non-finite component: {self:?}"
            )));
        }
        if self.phi <= 0.0 {
            return Err(RatingError::InvalidRating(format!("{who} phi {} <= 0", self.phi)));
        }
        if self.sigma <= 0.0 {
            return Err(RatingError::InvalidRating(format!(
                "{who} sigma {} <= 0",
                self.sigma
            )));
        }
        Ok(())
    }

    fn mu(&self) -> f64 {
        (self.rating - BASE_RATING) / SCALE
    }

    fn phi_internal(&self) -> f64 {
        self.phi / SCALE
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self {
            rating: 1500.0,
            phi: 350.0,
            sigma: 0.006,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    fn score(self) -> f64 {
        match self {
            Self::Win => 1.0,
            Self::Loss => 0.0,
            Self::Draw => 0.5,
        }
    }
}

/// One result in a rating period, seen from the subject's side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opponent {
    pub outcome: Outcome,
    pub rating: Rating,
}

impl Opponent {
    pub fn new(outcome: Outcome, rating: Rating) -> Self {
        Self { outcome, rating }
    }
}

/// Glicko-2 system parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Glicko2 {
    /// System constant constraining volatility change.
    pub tau: f64,
    /// Convergence tolerance of the volatility iteration.
    pub epsilon: f64,
}

impl Default for Glicko2 {
    fn default() -> Self {
        Self {
            tau: DEFAULT_TAU,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

fn g(phi: f64) -> f64 {
    1.0 / (1.0 + 3.0 * phi * phi / (std::f64::consts::PI * std::f64::consts::PI)).sqrt()
}

fn expected(mu: f64, mu_j: f64, phi_j: f64) -> f64 {
    1.0 / (1.0 + (-g(phi_j) * (mu - mu_j)).exp())
}

impl Glicko2 {
    /// Applies one rating period.
    ///
    /// All of `opponents` are treated as simultaneous results; callers must not
    /// feed a period's results one at a time. With no opponents only `phi`
    /// grows.
    pub fn rate(&self, subject: Rating, opponents: &[Opponent]) -> Result<Rating, RatingError> {
        subject.validate("subject")?;
        for (i, opp) in opponents.iter().enumerate() {
            opp.rating.validate(&format!("opponent {i}"))?;
        }

        let mu = subject.mu();
        let phi = subject.phi_internal();
        let sigma = subject.sigma;

        if opponents.is_empty() {
            let phi_star = (phi * phi + sigma * sigma).sqrt();
            return Ok(Rating {
                rating: subject.rating,
                phi: phi_star * SCALE,
                sigma,
            });
        }

        // Estimated variance v and the improvement sum.
        let mut v_inv = 0.0;
        let mut improvement = 0.0;
        for opp in opponents {
            let mu_j = opp.rating.mu();
            let phi_j = opp.rating.phi_internal();
            let g_j = g(phi_j);
            let e_j = expected(mu, mu_j, phi_j);
            v_inv += g_j * g_j * e_j * (1.0 - e_j);
            improvement += g_j * (opp.outcome.score() - e_j);
        }
        if v_inv <= 0.0 || !v_inv.is_finite() {
            return Err(RatingError::InvalidRating(format!(
                "degenerate variance {v_inv} for {subject:?}"
            )));
        }
        let v = 1.0 / v_inv;
        let delta = v * improvement;

        let sigma_prime = self.new_volatility(phi, sigma, v, delta);

        let phi_star = (phi * phi + sigma_prime * sigma_prime).sqrt();
        let phi_prime = 1.0 / (1.0 / (phi_star * phi_star) + 1.0 / v).sqrt();
        let mu_prime = mu + phi_prime * phi_prime * improvement;

        let next = Rating {
            rating: mu_prime * SCALE + BASE_RATING,
            phi: phi_prime * SCALE,
            sigma: sigma_prime,
        };
        next.validate("result")?;
        Ok(next)
    }

    /// Illinois-style bracketing solve for the new volatility (Glickman 2012,
    /// step 5).
    fn new_volatility(&self, phi: f64, sigma: f64, v: f64, delta: f64) -> f64 {
        let tau = self.tau;
        let a = (sigma * sigma).ln();
        let phi2 = phi * phi;
        let delta2 = delta * delta;

        let f = |x: f64| {
            let ex = x.exp();
            let denom = phi2 + v + ex;
            ex * (delta2 - phi2 - v - ex) / (2.0 * denom * denom) - (x - a) / (tau * tau)
        };

        let mut big_a = a;
        let mut big_b = if delta2 > phi2 + v {
            (delta2 - phi2 - v).ln()
        } else {
            let mut k = 1.0;
            while f(a - k * tau) < 0.0 {
                k += 1.0;
            }
            a - k * tau
        };

        let mut f_a = f(big_a);
        let mut f_b = f(big_b);
        let mut iterations = 0;
        while (big_b - big_a).abs() > self.epsilon && iterations < MAX_ITERATIONS {
            let big_c = big_a + (big_a - big_b) * f_a / (f_b - f_a);
            let f_c = f(big_c);
            if f_c * f_b <= 0.0 {
                big_a = big_b;
                f_a = f_b;
            } else {
                f_a /= 2.0;
            }
            big_b = big_c;
            f_b = f_c;
            iterations += 1;
        }

        (big_a / 2.0).exp()
    }
}
