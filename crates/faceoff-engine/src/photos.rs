use tracing::info;
use uuid::Uuid;

use faceoff_db::WinRow;
use faceoff_types::ids::new_id;
use faceoff_types::models::{
    DEFAULT_PHI, DEFAULT_RATING, DEFAULT_SIGMA, Gender, MediaKind, Photo, TagScoreRow, User,
    gender_tag,
};

use crate::{Engine, FaceoffError, Result};

/// Upload metadata for a new photo.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub media_kind: MediaKind,
    pub tags: Vec<String>,
    pub is_test: bool,
    pub duplicate_hash: Option<Vec<u8>>,
}

/// Trims a tag and rejects empty ones.
pub fn clean_tag(tag: &str) -> Result<&str> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(FaceoffError::InvalidInput("empty tag".into()));
    }
    Ok(tag)
}

impl Engine {
    pub fn register_user(
        &self,
        gender: Gender,
        view_gender: Gender,
        location_id: Uuid,
        is_test: bool,
    ) -> Result<User> {
        let user = User {
            id: new_id(),
            gender,
            view_gender,
            location_id,
            is_test,
            win_count: 0,
            loss_count: 0,
        };
        let now = self.now();
        self.config
            .retry
            .run("insert_user", || self.db.insert_user(&user, now))?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub fn get_user(&self, id: &Uuid) -> Result<User> {
        self.load_user(id)
    }

    /// Match wins credited to the user's photos, newest first.
    pub fn wins_for_user(&self, user_id: &Uuid, count: usize) -> Result<Vec<WinRow>> {
        let user = self.load_user(user_id)?;
        let limit = u32::try_from(count.min(self.config.max_page)).unwrap_or(u32::MAX);
        self.config
            .retry
            .run("wins_for_user", || self.db.wins_for_user(&user.id, limit))
    }

    /// Creates a photo in its owner's segment. It stays out of matches and
    /// leaderboards until [`Engine::mark_ready`].
    pub fn create_photo(&self, owner_id: &Uuid, new: NewPhoto) -> Result<Photo> {
        let owner = self.load_user(owner_id)?;

        if let Some(hash) = &new.duplicate_hash {
            let existing = self
                .config
                .retry
                .run("find_duplicate", || self.db.find_photo_by_duplicate_hash(hash))?;
            if let Some(existing) = existing {
                return Err(FaceoffError::DuplicatePhoto(existing.id));
            }
        }

        let mut tags: Vec<String> = Vec::new();
        for tag in &new.tags {
            let tag = clean_tag(tag)?;
            if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                tags.push(tag.to_string());
            }
        }
        tags.sort();

        let photo = Photo {
            id: new_id(),
            owner_id: owner.id,
            segment: self.config.segments.photo_segment(&owner),
            posted_at: self.now(),
            media_kind: new.media_kind,
            rating: DEFAULT_RATING,
            phi: DEFAULT_PHI,
            sigma: DEFAULT_SIGMA,
            ready: false,
            is_test: new.is_test || owner.is_test,
            duplicate_hash: new.duplicate_hash,
            bumped_once: false,
            tags,
        };
        self.config
            .retry
            .run("insert_photo", || self.db.insert_photo(&photo))?;
        info!(photo_id = %photo.id, owner = %owner.id, segment = %photo.segment, "photo created");
        Ok(photo)
    }

    pub fn get_photo(&self, id: &Uuid) -> Result<Photo> {
        self.config
            .retry
            .run("get_photo", || self.db.get_photo(id))?
            .ok_or(FaceoffError::PhotoNotFound(*id))
    }

    /// Upload and transcode finished. Tags start scoring at the current rating.
    pub fn mark_ready(&self, id: &Uuid) -> Result<Photo> {
        let mut photo = self.get_photo(id)?;
        if photo.ready {
            return Ok(photo);
        }
        self.config
            .retry
            .run("set_photo_ready", || self.db.set_photo_ready(id, true))?;
        photo.ready = true;
        for tag in &photo.tags {
            self.write_tag_score(&photo, tag)?;
        }
        info!(photo_id = %id, "photo ready");
        Ok(photo)
    }

    /// Pulls a photo out of circulation: no more matches, leaderboard rows or
    /// tag scores.
    pub fn take_down(&self, id: &Uuid) -> Result<()> {
        self.get_photo(id)?;
        let retry = &self.config.retry;
        retry.run("set_photo_ready", || self.db.set_photo_ready(id, false))?;
        let tags = retry.run("delete_tag_scores", || self.db.delete_tag_scores_for_photo(id))?;
        let rows = retry.run("delete_leaderboard_rows", || {
            self.db.delete_leaderboard_rows_for_photo(id)
        })?;
        info!(photo_id = %id, tag_rows = tags, leaderboard_rows = rows, "photo taken down");
        Ok(())
    }

    /// Adds a tag on behalf of the photo's owner. Returns false if the photo
    /// already had it.
    pub fn add_tag(&self, owner_id: &Uuid, photo_id: &Uuid, tag: &str) -> Result<bool> {
        let tag = clean_tag(tag)?;
        let mut photo = self.get_photo(photo_id)?;
        if photo.owner_id != *owner_id {
            return Err(FaceoffError::PhotoNotFound(*photo_id));
        }
        let added = self
            .config
            .retry
            .run("add_photo_tag", || self.db.add_photo_tag(photo_id, tag))?;
        if added {
            photo.tags.push(tag.to_string());
            if photo.ready {
                self.write_tag_score(&photo, tag)?;
            }
        }
        Ok(added)
    }

    /// Upserts the tag score row for one of the photo's tags at its current
    /// rating.
    pub(crate) fn write_tag_score(&self, photo: &Photo, tag: &str) -> Result<()> {
        let Some(gender) = photo.segment.gender() else {
            return Ok(());
        };
        let row = TagScoreRow {
            gender_tag: gender_tag(gender, tag),
            photo_id: photo.id,
            tag_display: tag.to_string(),
            rating: photo.rating,
        };
        self.config
            .retry
            .run("upsert_tag_score", || self.db.upsert_tag_score(&row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use faceoff_db::Database;

    use crate::EngineConfig;

    fn engine() -> Engine {
        Engine::new(Arc::new(Database::open_in_memory().unwrap()), EngineConfig::default())
    }

    fn upload(tags: &[&str]) -> NewPhoto {
        NewPhoto {
            media_kind: MediaKind::Photo,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_test: false,
            duplicate_hash: None,
        }
    }

    #[test]
    fn photo_lands_in_owner_segment_unready() {
        let engine = engine();
        let owner = engine
            .register_user(Gender::Male, Gender::Female, Uuid::from_u128(9), false)
            .unwrap();
        let photo = engine.create_photo(&owner.id, upload(&["Beach", "beach", " sunset "])).unwrap();
        assert!(!photo.ready);
        assert_eq!(photo.segment.gender(), Some(Gender::Male));
        assert_eq!(photo.tags, vec!["Beach".to_string(), "sunset".to_string()]);
        assert_eq!(photo.rating, DEFAULT_RATING);
    }

    #[test]
    fn duplicate_hash_is_rejected() {
        let engine = engine();
        let owner = engine
            .register_user(Gender::Female, Gender::Female, Uuid::from_u128(9), false)
            .unwrap();
        let mut first = upload(&[]);
        first.duplicate_hash = Some(vec![1, 2, 3]);
        let original = engine.create_photo(&owner.id, first.clone()).unwrap();

        match engine.create_photo(&owner.id, first) {
            Err(FaceoffError::DuplicatePhoto(id)) => assert_eq!(id, original.id),
            other => panic!("expected DuplicatePhoto, got {other:?}"),
        }
    }

    #[test]
    fn tag_scores_follow_readiness() {
        let engine = engine();
        let owner = engine
            .register_user(Gender::Female, Gender::Female, Uuid::from_u128(9), false)
            .unwrap();
        let photo = engine.create_photo(&owner.id, upload(&["Beach"])).unwrap();
        assert!(engine.db().tag_scores_for_photo(&photo.id).unwrap().is_empty());

        engine.mark_ready(&photo.id).unwrap();
        assert!(engine.add_tag(&owner.id, &photo.id, "Dogs").unwrap());
        assert!(!engine.add_tag(&owner.id, &photo.id, "dogs").unwrap());

        let rows = engine.db().tag_scores_for_photo(&photo.id).unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r.gender_tag.as_str()).collect();
        assert_eq!(keys, vec!["fbeach", "fdogs"]);
        assert!(rows.iter().all(|r| r.rating == DEFAULT_RATING));

        engine.take_down(&photo.id).unwrap();
        assert!(engine.db().tag_scores_for_photo(&photo.id).unwrap().is_empty());
        assert!(!engine.get_photo(&photo.id).unwrap().ready);
    }

    #[test]
    fn only_the_owner_may_tag() {
        let engine = engine();
        let owner = engine
            .register_user(Gender::Female, Gender::Female, Uuid::from_u128(9), false)
            .unwrap();
        let other = engine
            .register_user(Gender::Female, Gender::Female, Uuid::from_u128(9), false)
            .unwrap();
        let photo = engine.create_photo(&owner.id, upload(&[])).unwrap();
        assert!(matches!(
            engine.add_tag(&other.id, &photo.id, "x"),
            Err(FaceoffError::PhotoNotFound(_))
        ));
        assert!(matches!(
            engine.add_tag(&owner.id, &photo.id, "   "),
            Err(FaceoffError::InvalidInput(_))
        ));
    }
}
