use std::time::Duration as StdDuration;

use chrono::Duration;
use uuid::Uuid;

use faceoff_rating::Glicko2;
use faceoff_types::models::{Gender, Segment, User};

use crate::retry::RetryPolicy;

/// Decides which segment a user's photos are posted to and which one they
/// browse.
///
/// `forced_gender` pins both sides to one gender, e.g. to run a single shared
/// pool per location.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentPolicy {
    pub forced_gender: Option<Gender>,
}

impl SegmentPolicy {
    pub fn photo_segment(&self, owner: &User) -> Segment {
        self.segment(owner.gender, &owner.location_id)
    }

    pub fn view_segment(&self, viewer: &User) -> Segment {
        self.segment(viewer.view_gender, &viewer.location_id)
    }

    /// Gender whose photos `viewer` is shown.
    pub fn view_gender(&self, viewer: &User) -> Gender {
        self.forced_gender.unwrap_or(viewer.view_gender)
    }

    fn segment(&self, gender: Gender, location_id: &Uuid) -> Segment {
        Segment::new(self.forced_gender.unwrap_or(gender), location_id)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Most recent ready photos considered for one match stream.
    pub pool_size: u32,
    /// Entries per match stream.
    pub stream_len: usize,
    /// Largest page any list endpoint returns.
    pub max_page: usize,
    /// Rows walked looking for a pagination fence.
    pub max_scan: u32,
    /// Inactivity after which tournament cadence starts over.
    pub cadence_idle: Duration,
    /// Score Event Log partitions.
    pub shards: u32,
    /// Events per drain batch.
    pub score_batch: u32,
    /// Wall-clock budget for one score tick.
    pub score_budget: StdDuration,
    /// Consumed events older than this are pruned.
    pub event_retention: Duration,
    /// Leaderboard rows deleted per trim scan.
    pub trim_batch: u32,
    pub retry: RetryPolicy,
    pub segments: SegmentPolicy,
    pub glicko: Glicko2,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: 200,
            stream_len: 10,
            max_page: 50,
            max_scan: 1000,
            cadence_idle: Duration::hours(1),
            shards: 4,
            score_batch: 500,
            score_budget: StdDuration::from_secs(180),
            event_retention: Duration::days(7),
            trim_batch: 500,
            retry: RetryPolicy::default(),
            segments: SegmentPolicy::default(),
            glicko: Glicko2::default(),
        }
    }
}
