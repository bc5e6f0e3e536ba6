use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_RATING: f64 = 1500.0;
pub const DEFAULT_PHI: f64 = 350.0;
pub const DEFAULT_SIGMA: f64 = 0.006;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Single-byte code used as the first character of a segment.
    pub fn code(self) -> char {
        match self {
            Self::Male => 'm',
            Self::Female => 'f',
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" | "male" => Ok(Self::Male),
            "f" | "female" => Ok(Self::Female),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Movie,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Movie => "movie",
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(Self::Photo),
            "movie" => Ok(Self::Movie),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// Audience partition: one gender byte followed by the 32 hex chars of the
/// location id. `Segment::all()` is the sentinel for cross-segment reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Segment(String);

impl Segment {
    pub const ALL: &'static str = "all";

    pub fn new(gender: Gender, location_id: &Uuid) -> Self {
        Self(format!("{}{}", gender.code(), location_id.simple()))
    }

    pub fn all() -> Self {
        Self(Self::ALL.to_string())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn is_all(&self) -> bool {
        self.0 == Self::ALL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn gender(&self) -> Option<Gender> {
        self.0.get(..1).and_then(|c| c.parse().ok())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rolling leaderboard window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Window {
    pub const ALL: [Window; 5] = [
        Window::Hour,
        Window::Day,
        Window::Week,
        Window::Month,
        Window::Year,
    ];

    pub fn span(self) -> Duration {
        match self {
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
            Self::Year => Duration::days(365),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// True if something posted at `posted_at` still belongs in this window.
    pub fn contains(self, posted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - posted_at <= self.span()
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(format!("unknown window: {other}")),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentKind {
    Local,
    Regional,
    Global,
}

impl TournamentKind {
    /// The kind fired after this one, and the countdown leading up to it.
    pub fn successor(self) -> (TournamentKind, u32) {
        match self {
            Self::Local => (Self::Regional, 8),
            Self::Regional => (Self::Global, 8),
            Self::Global => (Self::Local, 10),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Regional => "regional",
            Self::Global => "global",
        }
    }
}

impl FromStr for TournamentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "regional" => Ok(Self::Regional),
            "global" => Ok(Self::Global),
            other => Err(format!("unknown tournament kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    A,
    B,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub gender: Gender,
    pub view_gender: Gender,
    pub location_id: Uuid,
    pub is_test: bool,
    pub win_count: i64,
    pub loss_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub segment: Segment,
    pub posted_at: DateTime<Utc>,
    pub media_kind: MediaKind,
    pub rating: f64,
    pub phi: f64,
    pub sigma: f64,
    pub ready: bool,
    pub is_test: bool,
    #[serde(skip)]
    pub duplicate_hash: Option<Vec<u8>>,
    pub bumped_once: bool,
    pub tags: Vec<String>,
}

impl Photo {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    pub photo_a: Uuid,
    pub photo_b: Uuid,
    pub viewer: Uuid,
    pub proposed_at: DateTime<Utc>,
    pub judged: bool,
    pub judged_at: Option<DateTime<Utc>>,
    pub scored_at: Option<DateTime<Utc>>,
    pub a_won: Option<bool>,
    pub a_win_delta: f64,
    pub a_lose_delta: f64,
    pub b_win_delta: f64,
    pub b_lose_delta: f64,
}

impl MatchRecord {
    /// Winner and loser photo ids, once judged.
    pub fn outcome(&self) -> Option<(Uuid, Uuid)> {
        match self.a_won {
            Some(true) => Some((self.photo_a, self.photo_b)),
            Some(false) => Some((self.photo_b, self.photo_a)),
            None => None,
        }
    }
}

/// Number of entrants in a bracket.
pub const BRACKET_SIZE: usize = 16;
/// Games in a single-elimination bracket of `BRACKET_SIZE`: 8 + 4 + 2 + 1.
pub const BRACKET_GAMES: usize = BRACKET_SIZE - 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: Uuid,
    pub viewer: Uuid,
    pub kind: TournamentKind,
    pub segment: Segment,
    pub seeds: Vec<Uuid>,
    /// Winners of the fourteen games before the final, in game order.
    pub results: Vec<Uuid>,
    pub winner: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub judged: bool,
    pub judged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CadenceState {
    pub matches_until_next_tournament: u32,
    pub next_tournament_kind: TournamentKind,
    pub last_touched: DateTime<Utc>,
}

impl CadenceState {
    pub const INITIAL_COUNTDOWN: u32 = 10;

    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            matches_until_next_tournament: Self::INITIAL_COUNTDOWN,
            next_tournament_kind: TournamentKind::Local,
            last_touched: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub window: Window,
    pub segment: Segment,
    pub photo_id: Uuid,
    pub rating: f64,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagScoreRow {
    pub gender_tag: String,
    pub photo_id: Uuid,
    pub tag_display: String,
    pub rating: f64,
}

/// Partition key of the tag index: gender code followed by the lowercased tag.
pub fn gender_tag(gender: Gender, tag: &str) -> String {
    format!("{}{}", gender.code(), tag.to_lowercase())
}
