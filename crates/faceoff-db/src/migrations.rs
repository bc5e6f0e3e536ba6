use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                gender      TEXT NOT NULL,
                view_gender TEXT NOT NULL,
                location_id TEXT NOT NULL,
                is_test     INTEGER NOT NULL DEFAULT 0,
                win_count   INTEGER NOT NULL DEFAULT 0,
                loss_count  INTEGER NOT NULL DEFAULT 0,
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE photos (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id),
                segment         TEXT NOT NULL,
                posted_at       INTEGER NOT NULL,
                media_kind      TEXT NOT NULL,
                rating          REAL NOT NULL DEFAULT 1500,
                phi             REAL NOT NULL DEFAULT 350,
                sigma           REAL NOT NULL DEFAULT 0.006,
                ready           INTEGER NOT NULL DEFAULT 0,
                is_test         INTEGER NOT NULL DEFAULT 0,
                duplicate_hash  BLOB,
                bumped_once     INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_photos_owner ON photos(owner_id, posted_at);
            CREATE INDEX idx_photos_segment_posted ON photos(segment, posted_at);
            CREATE INDEX idx_photos_segment_rating ON photos(segment, rating);
            CREATE INDEX idx_photos_rating ON photos(rating);
            CREATE INDEX idx_photos_dupe ON photos(duplicate_hash);

            CREATE TABLE photo_tags (
                photo_id    TEXT NOT NULL REFERENCES photos(id),
                tag_key     TEXT NOT NULL,
                tag_display TEXT NOT NULL,
                PRIMARY KEY (photo_id, tag_key)
            );

            -- Pair is stored canonically: photo_a sorts before photo_b.
            CREATE TABLE matches (
                id              TEXT NOT NULL UNIQUE,
                photo_a         TEXT NOT NULL,
                photo_b         TEXT NOT NULL,
                viewer          TEXT NOT NULL,
                proposed_at     INTEGER NOT NULL,
                judged          INTEGER NOT NULL DEFAULT 0,
                judged_at       INTEGER,
                scored_at       INTEGER,
                a_won           INTEGER,
                a_win_delta     REAL NOT NULL,
                a_lose_delta    REAL NOT NULL,
                b_win_delta     REAL NOT NULL,
                b_lose_delta    REAL NOT NULL,
                PRIMARY KEY (photo_a, photo_b, viewer),
                CHECK (photo_a < photo_b)
            );

            CREATE TABLE wins (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                photo_id    TEXT NOT NULL,
                match_id    TEXT NOT NULL,
                viewer      TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_wins_user ON wins(user_id, created_at);

            CREATE TABLE leaderboard_rows (
                board       TEXT NOT NULL,
                segment     TEXT NOT NULL,
                photo_id    TEXT NOT NULL,
                rating      REAL NOT NULL,
                posted_at   INTEGER NOT NULL,
                PRIMARY KEY (board, segment, photo_id)
            );

            CREATE INDEX idx_leaderboard_score ON leaderboard_rows(board, segment, rating DESC);
            CREATE INDEX idx_leaderboard_posted ON leaderboard_rows(board, segment, posted_at);
            CREATE INDEX idx_leaderboard_global ON leaderboard_rows(board, rating DESC);
            CREATE INDEX idx_leaderboard_photo ON leaderboard_rows(photo_id);

            CREATE TABLE tag_scores (
                gender_tag  TEXT NOT NULL,
                photo_id    TEXT NOT NULL,
                tag_display TEXT NOT NULL,
                rating      REAL NOT NULL,
                PRIMARY KEY (gender_tag, photo_id)
            );

            CREATE INDEX idx_tag_scores_rating ON tag_scores(gender_tag, rating DESC);
            CREATE INDEX idx_tag_scores_photo ON tag_scores(photo_id);

            CREATE TABLE tournaments (
                id          TEXT PRIMARY KEY,
                viewer      TEXT NOT NULL,
                kind        TEXT NOT NULL,
                segment     TEXT NOT NULL,
                seeds       TEXT NOT NULL,
                results     TEXT,
                winner      TEXT,
                created_at  INTEGER NOT NULL,
                judged      INTEGER NOT NULL DEFAULT 0,
                judged_at   INTEGER
            );

            CREATE INDEX idx_tournaments_viewer ON tournaments(viewer, created_at);

            CREATE TABLE cadence (
                viewer              TEXT PRIMARY KEY,
                matches_until_next  INTEGER NOT NULL,
                next_kind           TEXT NOT NULL,
                last_touched        INTEGER NOT NULL
            );

            CREATE TABLE score_log_meta (
                id      INTEGER PRIMARY KEY CHECK (id = 1),
                epoch   TEXT NOT NULL
            );

            INSERT INTO score_log_meta (id, epoch) VALUES (1, lower(hex(randomblob(16))));

            CREATE TABLE score_events (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                shard       INTEGER NOT NULL,
                payload     BLOB NOT NULL,
                appended_at INTEGER NOT NULL
            );

            CREATE INDEX idx_score_events_shard ON score_events(shard, seq);

            CREATE TABLE consumer_cursors (
                stream      TEXT NOT NULL,
                shard       INTEGER NOT NULL,
                epoch       TEXT NOT NULL,
                last_seq    INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL,
                PRIMARY KEY (stream, shard)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
