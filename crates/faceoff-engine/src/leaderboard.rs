use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use faceoff_types::models::{Gender, Photo, Segment, Window, gender_tag};

use crate::photos::clean_tag;
use crate::{Engine, Result};

/// Which ranking to read: the canonical rating on photos, or one of the
/// windowed boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    Alltime,
    Window(Window),
}

impl FromStr for Board {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "alltime" => Ok(Self::Alltime),
            other => other.parse().map(Self::Window),
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alltime => f.write_str("alltime"),
            Self::Window(w) => w.fmt(f),
        }
    }
}

/// Up to `count` ids strictly after `after` in an already ordered list. An
/// unknown fence yields nothing.
pub fn page_after(ordered: &[Uuid], after: Option<Uuid>, count: usize) -> Vec<Uuid> {
    let start = match after {
        None => 0,
        Some(fence) => match ordered.iter().position(|id| *id == fence) {
            Some(pos) => pos + 1,
            None => return Vec::new(),
        },
    };
    ordered.iter().skip(start).take(count).copied().collect()
}

impl Engine {
    /// Ranked ready photos of `segment` (or every segment for
    /// [`Segment::all`]).
    pub fn get_leaderboard(
        &self,
        segment: &Segment,
        board: Board,
        after: Option<Uuid>,
        count: usize,
    ) -> Result<Vec<Photo>> {
        let retry = &self.config.retry;
        let scan = self.config.max_scan;
        let ordered: Vec<Uuid> = match board {
            Board::Alltime => retry
                .run("top_rated_photos", || self.db.top_rated_photos(segment, scan))?
                .into_iter()
                .map(|p| p.id)
                .collect(),
            Board::Window(window) => retry
                .run("leaderboard_top", || self.db.leaderboard_top(window, segment, scan))?
                .into_iter()
                .map(|r| r.photo_id)
                .collect(),
        };
        self.load_page(&ordered, after, count)
    }

    /// Highest rated photos carrying `tag`, for viewers of `gender`.
    pub fn get_tag_top(
        &self,
        gender: Gender,
        tag: &str,
        after: Option<Uuid>,
        count: usize,
    ) -> Result<Vec<Photo>> {
        let key = gender_tag(gender, clean_tag(tag)?);
        let rows = self
            .config
            .retry
            .run("tag_top", || self.db.tag_top(&key, self.config.max_scan))?;
        let ordered: Vec<Uuid> = rows.into_iter().map(|r| r.photo_id).collect();
        self.load_page(&ordered, after, count)
    }

    fn load_page(&self, ordered: &[Uuid], after: Option<Uuid>, count: usize) -> Result<Vec<Photo>> {
        let page = page_after(ordered, after, count.min(self.config.max_page));
        if page.is_empty() {
            return Ok(Vec::new());
        }
        let mut photos: HashMap<Uuid, Photo> = self
            .config
            .retry
            .run("get_photos", || self.db.get_photos(&page))?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        Ok(page
            .iter()
            .filter_map(|id| photos.remove(id))
            .filter(|p| p.ready)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u128) -> Vec<Uuid> {
        (1..=n).map(Uuid::from_u128).collect()
    }

    #[test]
    fn fence_is_exclusive() {
        let all = ids(5);
        assert_eq!(page_after(&all, None, 2), ids(2));
        assert_eq!(
            page_after(&all, Some(Uuid::from_u128(2)), 2),
            vec![Uuid::from_u128(3), Uuid::from_u128(4)]
        );
        assert_eq!(page_after(&all, Some(Uuid::from_u128(5)), 2), Vec::<Uuid>::new());
    }

    #[test]
    fn unknown_fence_yields_nothing() {
        assert!(page_after(&ids(5), Some(Uuid::from_u128(42)), 3).is_empty());
    }

    #[test]
    fn board_names() {
        assert_eq!("alltime".parse::<Board>(), Ok(Board::Alltime));
        assert_eq!("week".parse::<Board>(), Ok(Board::Window(Window::Week)));
        assert!("fortnight".parse::<Board>().is_err());
        assert_eq!(Board::Window(Window::Day).to_string(), "day");
    }
}
