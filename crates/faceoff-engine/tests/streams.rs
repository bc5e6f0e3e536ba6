mod common;

use std::collections::HashSet;

use uuid::Uuid;

use common::Harness;
use faceoff_engine::{Board, EngineConfig, FaceoffError, NewPhoto};
use faceoff_types::feed::FeedEvent;
use faceoff_types::models::{Gender, MediaKind, Segment, Side, TournamentKind, Window};

/// Winners in play order when the first-listed entrant takes every game.
fn chalk(seeds: &[Uuid]) -> Vec<Uuid> {
    let mut votes = Vec::new();
    let mut entrants = seeds.to_vec();
    while entrants.len() > 1 {
        entrants = entrants.chunks(2).map(|p| p[0]).collect();
        votes.extend(entrants.iter().copied());
    }
    votes
}

/// Runs a fresh viewer through ten judged matches and returns the
/// tournament the next stream opens with.
fn first_tournament(h: &Harness, viewer: &Uuid) -> faceoff_types::api::TournamentView {
    let items = h.engine.get_match_stream(viewer, true).unwrap();
    for m in items.iter().filter_map(|i| i.as_match()) {
        h.engine.judge_match(viewer, &m.match_id, Side::B).unwrap();
    }
    let next = h.engine.get_match_stream(viewer, false).unwrap();
    next[0].as_tournament().unwrap().clone()
}

#[test]
fn tag_stream_draws_only_tagged_photos() {
    let h = Harness::new();
    let viewer = h.user();
    let tagged: HashSet<Uuid> = (0..4)
        .map(|_| h.photo_with(&h.user(), MediaKind::Photo, &["Sunset"]).id)
        .collect();
    h.pool(6);

    let items = h.engine.get_tag_match_stream(&viewer.id, " sunset ").unwrap();
    assert!(!items.is_empty());
    for m in &items {
        assert!(tagged.contains(&m.photo_a));
        assert!(tagged.contains(&m.photo_b));
    }

    // No tournament countdown for tag matches.
    let state = h.engine.cadence_state(&viewer.id).unwrap();
    assert_eq!(state.matches_until_next_tournament, 10);
}

#[test]
fn tag_stream_offers_every_tagged_pair_before_running_dry() {
    let h = Harness::new();
    let viewer = h.user();
    for _ in 0..5 {
        h.photo_with(&h.user(), MediaKind::Photo, &["Lake"]);
    }
    h.pool(4);

    let mut seen = HashSet::new();
    loop {
        match h.engine.get_tag_match_stream(&viewer.id, "lake") {
            Ok(items) => {
                for m in &items {
                    assert!(seen.insert((m.photo_a, m.photo_b)), "pair repeated");
                }
            }
            Err(FaceoffError::InsufficientPool) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(seen.len(), 10);
}

#[test]
fn unknown_tag_has_no_pool() {
    let h = Harness::new();
    let viewer = h.user();
    h.pool(4);
    assert!(matches!(
        h.engine.get_tag_match_stream(&viewer.id, "nothing-here"),
        Err(FaceoffError::InsufficientPool)
    ));
    assert!(matches!(
        h.engine.get_tag_match_stream(&viewer.id, "   "),
        Err(FaceoffError::InvalidInput(_))
    ));
}

#[test]
fn match_for_a_specific_photo() {
    let h = Harness::new();
    let viewer = h.user();
    let pool = h.pool(3);

    let view = h.engine.get_match_for(&viewer.id, &pool[0].id).unwrap();
    assert!(view.photo_a == pool[0].id || view.photo_b == pool[0].id);
    h.engine.get_match_for(&viewer.id, &pool[0].id).unwrap();

    // Both opponents used up.
    assert!(matches!(
        h.engine.get_match_for(&viewer.id, &pool[0].id),
        Err(FaceoffError::NoOpponent(id)) if id == pool[0].id
    ));

    let missing = Uuid::from_u128(7);
    assert!(matches!(
        h.engine.get_match_for(&viewer.id, &missing),
        Err(FaceoffError::PhotoNotFound(id)) if id == missing
    ));
}

#[test]
fn taken_down_photo_cannot_be_matched() {
    let h = Harness::new();
    let viewer = h.user();
    let pool = h.pool(3);
    h.engine.take_down(&pool[0].id).unwrap();
    assert!(matches!(
        h.engine.get_match_for(&viewer.id, &pool[0].id),
        Err(FaceoffError::PhotoNotFound(_))
    ));
}

#[test]
fn judging_another_viewers_match_is_not_found() {
    let h = Harness::new();
    let viewer = h.user();
    let stranger = h.user();
    h.pool(2);
    let items = h.engine.get_match_stream(&viewer.id, false).unwrap();
    let m = items[0].as_match().unwrap();
    assert!(matches!(
        h.engine.judge_match(&stranger.id, &m.match_id, Side::A),
        Err(FaceoffError::NotFound("match"))
    ));
}

#[test]
fn judged_match_is_announced() {
    let h = Harness::new();
    let viewer = h.user();
    let mut feed = h.feed.subscribe();
    h.pool(2);

    let items = h.engine.get_match_stream(&viewer.id, false).unwrap();
    let m = items[0].as_match().unwrap();
    h.engine.judge_match(&viewer.id, &m.match_id, Side::B).unwrap();

    let winner = h.engine.get_photo(&m.photo_b).unwrap();
    match feed.try_recv().unwrap() {
        FeedEvent::MatchWon {
            match_id,
            photo_id,
            owner_id,
            viewer: v,
        } => {
            assert_eq!(match_id, m.match_id);
            assert_eq!(photo_id, winner.id);
            assert_eq!(owner_id, winner.owner_id);
            assert_eq!(v, viewer.id);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(feed.try_recv().is_err());
}

#[test]
fn tournament_is_judged_once() {
    let h = Harness::new();
    let viewer = h.user();
    h.pool(34);
    let t = first_tournament(&h, &viewer.id);
    assert_eq!(t.kind, TournamentKind::Local);
    assert_eq!(t.seeds.len(), 16);

    let mut feed = h.feed.subscribe();
    let votes = chalk(&t.seeds);
    h.engine.judge_tournament(&viewer.id, &t.tournament_id, &votes).unwrap();

    let stored = h.engine.get_tournament(&viewer.id, &t.tournament_id).unwrap();
    assert!(stored.judged);
    assert_eq!(stored.winner, Some(t.seeds[0]));

    match feed.try_recv().unwrap() {
        FeedEvent::TournamentWon { photo_id, kind, .. } => {
            assert_eq!(photo_id, t.seeds[0]);
            assert_eq!(kind, TournamentKind::Local);
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert!(matches!(
        h.engine.judge_tournament(&viewer.id, &t.tournament_id, &votes),
        Err(FaceoffError::AlreadyJudged)
    ));
}

#[test]
fn bad_bracket_leaves_tournament_open() {
    let h = Harness::new();
    let viewer = h.user();
    h.pool(34);
    let t = first_tournament(&h, &viewer.id);

    let mut votes = chalk(&t.seeds);
    votes[14] = Uuid::from_u128(99);
    assert!(matches!(
        h.engine.judge_tournament(&viewer.id, &t.tournament_id, &votes),
        Err(FaceoffError::InvalidBracket(_))
    ));
    assert!(!h.engine.get_tournament(&viewer.id, &t.tournament_id).unwrap().judged);

    let other = h.user();
    assert!(matches!(
        h.engine.get_tournament(&other.id, &t.tournament_id),
        Err(FaceoffError::NotFound("tournament"))
    ));
}

#[test]
fn small_pool_skips_the_tournament_and_keeps_matching() {
    let h = Harness::with_config(EngineConfig {
        stream_len: 1,
        ..EngineConfig::default()
    });
    let viewer = h.user();
    h.pool(10);

    for call in 0..11 {
        let items = h.engine.get_match_stream(&viewer.id, call == 0).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind_label(), "match");
    }
    let state = h.engine.cadence_state(&viewer.id).unwrap();
    assert_eq!(state.matches_until_next_tournament, 0);
    assert_eq!(state.next_tournament_kind, TournamentKind::Local);
}

#[test]
fn test_photos_are_shown_only_to_test_viewers() {
    let h = Harness::new();
    for _ in 0..4 {
        let owner = h.user();
        let photo = h
            .engine
            .create_photo(
                &owner.id,
                NewPhoto {
                    media_kind: MediaKind::Photo,
                    tags: Vec::new(),
                    is_test: true,
                    duplicate_hash: None,
                },
            )
            .unwrap();
        h.engine.mark_ready(&photo.id).unwrap();
    }

    let viewer = h.user();
    assert!(matches!(
        h.engine.get_match_stream(&viewer.id, false),
        Err(FaceoffError::InsufficientPool)
    ));
    let tester = h.test_user();
    assert_eq!(h.engine.get_match_stream(&tester.id, false).unwrap().len(), 2);
}

#[test]
fn duplicate_upload_is_rejected() {
    let h = Harness::new();
    let owner = h.user();
    let upload = || NewPhoto {
        media_kind: MediaKind::Photo,
        tags: vec!["Dog".into(), "dog".into(), "Park".into()],
        is_test: false,
        duplicate_hash: Some(vec![0xab; 16]),
    };
    let first = h.engine.create_photo(&owner.id, upload()).unwrap();
    assert_eq!(first.tags, vec!["Dog".to_string(), "Park".to_string()]);
    assert!(!first.ready);
    assert!(matches!(
        h.engine.create_photo(&owner.id, upload()),
        Err(FaceoffError::DuplicatePhoto(id)) if id == first.id
    ));
}

#[test]
fn take_down_clears_boards() {
    let h = Harness::new();
    let viewer = h.user();
    let p = h.photo_with(&h.user(), MediaKind::Photo, &["Snow"]);
    h.photo(&h.user());
    let items = h.engine.get_match_stream(&viewer.id, false).unwrap();
    h.engine
        .judge_match(&viewer.id, &items[0].as_match().unwrap().match_id, Side::A)
        .unwrap();
    h.engine.run_score_tick().unwrap();
    assert_eq!(h.engine.db().leaderboard_len(Window::Hour, &h.segment()).unwrap(), 2);

    h.engine.take_down(&p.id).unwrap();
    assert_eq!(h.engine.db().leaderboard_len(Window::Hour, &h.segment()).unwrap(), 1);
    assert!(h.engine.db().tag_scores_for_photo(&p.id).unwrap().is_empty());
    assert!(
        h.engine
            .get_tag_top(Gender::Female, "snow", None, 10)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn alltime_board_spans_segments() {
    let h = Harness::new();
    let local = h.pool(2);
    let elsewhere = Uuid::from_u128(0xfeed);
    let far = h
        .engine
        .register_user(Gender::Female, Gender::Female, elsewhere, false)
        .unwrap();
    let far_photo = h.photo(&far);

    let here = h
        .engine
        .get_leaderboard(&h.segment(), Board::Alltime, None, 10)
        .unwrap();
    assert_eq!(here.len(), 2);
    assert!(here.iter().all(|p| local.iter().any(|l| l.id == p.id)));

    let everywhere = h
        .engine
        .get_leaderboard(&Segment::all(), Board::Alltime, None, 10)
        .unwrap();
    assert_eq!(everywhere.len(), 3);
    assert!(everywhere.iter().any(|p| p.id == far_photo.id));

    let page = h
        .engine
        .get_leaderboard(&Segment::all(), Board::Alltime, None, 2)
        .unwrap();
    assert_eq!(page.len(), 2);
}

#[test]
fn tag_top_pages_by_rating() {
    let h = Harness::new();
    let viewer = h.user();
    let p = h.photo_with(&h.user(), MediaKind::Photo, &["Lake"]);
    let q = h.photo_with(&h.user(), MediaKind::Photo, &["lake"]);
    let view = h.engine.get_match_for(&viewer.id, &p.id).unwrap();
    let side = if view.photo_a == q.id { Side::A } else { Side::B };
    h.engine.judge_match(&viewer.id, &view.match_id, side).unwrap();
    h.engine.run_score_tick().unwrap();

    let top = h.engine.get_tag_top(Gender::Female, "LAKE", None, 10).unwrap();
    assert_eq!(top.iter().map(|p| p.id).collect::<Vec<_>>(), vec![q.id, p.id]);
    let rest = h.engine.get_tag_top(Gender::Female, "lake", Some(q.id), 10).unwrap();
    assert_eq!(rest.iter().map(|p| p.id).collect::<Vec<_>>(), vec![p.id]);
}

#[test]
fn wins_are_credited_to_the_owner() {
    let h = Harness::new();
    let viewer = h.user();
    let owner = h.user();
    let p = h.photo(&owner);
    h.photo(&h.user());

    let view = h.engine.get_match_for(&viewer.id, &p.id).unwrap();
    let side = if view.photo_a == p.id { Side::A } else { Side::B };
    h.engine.judge_match(&viewer.id, &view.match_id, side).unwrap();

    let wins = h.engine.wins_for_user(&owner.id, 10).unwrap();
    assert_eq!(wins.len(), 1);
    assert_eq!(wins[0].photo_id, p.id);
    assert_eq!(wins[0].match_id, view.match_id);
    assert!(h.engine.wins_for_user(&viewer.id, 10).unwrap().is_empty());
}
