use std::time::Duration;

use tracing::warn;

use crate::error::{FaceoffError, Result};

/// Exponential backoff for store calls that hit SQLite contention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(25),
            cap: Duration::from_secs(1),
            attempts: 6,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Runs `op`, retrying transient failures. Anything else is returned on
    /// the first failure.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> anyhow::Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if faceoff_db::is_transient(&e) => {
                    if attempt >= self.attempts {
                        return Err(FaceoffError::TransientStore {
                            attempts: attempt,
                            source: e,
                        });
                    }
                    let delay = self.delay(attempt);
                    warn!(op = what, attempt, delay_ms = delay.as_millis() as u64, "store busy, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(FaceoffError::Store(e)),
            }
        }
    }
}
