/// faceoff-engine: matchmaking, judging, scoring and leaderboards.
///
/// Everything here is synchronous and talks to the store through
/// [`faceoff_db::Database`]. The request layer calls into an [`Engine`] from
/// blocking tasks; the scheduler calls [`Engine::run_score_tick`] and
/// [`Engine::run_trim`] on their own cadence.
pub mod cadence;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod judging;
pub mod leaderboard;
pub mod photos;
pub mod processor;
pub mod proposer;
pub mod retry;
pub mod score_log;
pub mod trim;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::SeedableRng;
use rand::rngs::StdRng;
use uuid::Uuid;

use faceoff_db::Database;
use faceoff_types::models::User;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, SegmentPolicy};
pub use error::{FaceoffError, Result};
pub use feed::{BroadcastFeed, FeedSink, NullFeed};
pub use leaderboard::Board;
pub use photos::NewPhoto;
pub use retry::RetryPolicy;

pub struct Engine {
    db: Arc<Database>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    feed: Arc<dyn FeedSink>,
    seed: Option<u64>,
    rng_calls: AtomicU64,
}

impl Engine {
    pub fn new(db: Arc<Database>, config: EngineConfig) -> Self {
        Self {
            db,
            config,
            clock: Arc::new(SystemClock),
            feed: Arc::new(NullFeed),
            seed: None,
            rng_calls: AtomicU64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_feed(mut self, feed: Arc<dyn FeedSink>) -> Self {
        self.feed = feed;
        self
    }

    /// Makes pair sampling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// A generator for one request.
    pub(crate) fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => {
                let n = self.rng_calls.fetch_add(1, Ordering::Relaxed);
                StdRng::seed_from_u64(seed.wrapping_add(n))
            }
            None => StdRng::from_os_rng(),
        }
    }

    pub(crate) fn load_user(&self, id: &Uuid) -> Result<User> {
        self.config
            .retry
            .run("get_user", || self.db.get_user(id))?
            .ok_or(FaceoffError::NotFound("user"))
    }
}
