#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use faceoff_db::Database;
use faceoff_engine::{BroadcastFeed, Engine, EngineConfig, ManualClock, NewPhoto};
use faceoff_types::models::{Gender, MediaKind, Photo, Segment, User};

pub const LOCATION: Uuid = Uuid::from_u128(0x5eed_0000_0000_0000_0000_0000_0000_0001);

pub struct Harness {
    pub engine: Engine,
    pub clock: Arc<ManualClock>,
    pub feed: BroadcastFeed,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let feed = BroadcastFeed::new(256);
        let engine = Engine::new(db, config)
            .with_clock(clock.clone())
            .with_feed(Arc::new(feed.clone()))
            .with_seed(42);
        Self { engine, clock, feed }
    }

    pub fn segment(&self) -> Segment {
        Segment::new(Gender::Female, &LOCATION)
    }

    pub fn user(&self) -> User {
        self.engine
            .register_user(Gender::Female, Gender::Female, LOCATION, false)
            .unwrap()
    }

    pub fn test_user(&self) -> User {
        self.engine
            .register_user(Gender::Female, Gender::Female, LOCATION, true)
            .unwrap()
    }

    /// A ready photo, posted one second after the previous one.
    pub fn photo(&self, owner: &User) -> Photo {
        self.photo_with(owner, MediaKind::Photo, &[])
    }

    pub fn photo_with(&self, owner: &User, kind: MediaKind, tags: &[&str]) -> Photo {
        self.clock.advance(Duration::seconds(1));
        let photo = self
            .engine
            .create_photo(
                &owner.id,
                NewPhoto {
                    media_kind: kind,
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    is_test: false,
                    duplicate_hash: None,
                },
            )
            .unwrap();
        self.engine.mark_ready(&photo.id).unwrap()
    }

    /// `n` ready photos, each from its own owner.
    pub fn pool(&self, n: usize) -> Vec<Photo> {
        (0..n).map(|_| self.photo(&self.user())).collect()
    }

    pub fn reload(&self, photo: &Photo) -> Photo {
        self.engine.get_photo(&photo.id).unwrap()
    }
}
