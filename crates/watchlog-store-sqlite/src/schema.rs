//! SQL schema for the watchlog SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Soft-deleted rows keep their key so a re-add restores them.
CREATE TABLE IF NOT EXISTS titles (
    title_id      TEXT PRIMARY KEY,
    owner_id      TEXT NOT NULL,
    content_kind  TEXT NOT NULL,   -- 'movie' | 'show' | 'game'
    content_id    INTEGER NOT NULL,
    content_name  TEXT NOT NULL,
    status        TEXT,            -- WatchStatus or NULL
    rating        INTEGER NOT NULL DEFAULT 0,
    thoughts      TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    deleted_at    TEXT,
    UNIQUE (owner_id, content_kind, content_id)
);

CREATE TABLE IF NOT EXISTS seasons (
    season_id     TEXT PRIMARY KEY,
    title_id      TEXT NOT NULL REFERENCES titles(title_id) ON DELETE CASCADE,
    owner_id      TEXT NOT NULL,
    season_number INTEGER NOT NULL,
    status        TEXT,
    rating        INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    UNIQUE (title_id, season_number)
);

-- Keyed by number, never by catalog episode id.
CREATE TABLE IF NOT EXISTS episodes (
    episode_id     TEXT PRIMARY KEY,
    title_id       TEXT NOT NULL REFERENCES titles(title_id) ON DELETE CASCADE,
    owner_id       TEXT NOT NULL,
    season_number  INTEGER NOT NULL,
    episode_number INTEGER NOT NULL,
    status         TEXT,
    rating         INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    UNIQUE (title_id, season_number, episode_number)
);

-- Append-only apart from custom_date.
CREATE TABLE IF NOT EXISTS activities (
    activity_id   TEXT PRIMARY KEY,
    owner_id      TEXT NOT NULL,
    title_id      TEXT NOT NULL REFERENCES titles(title_id) ON DELETE CASCADE,
    activity_type TEXT NOT NULL,   -- discriminant of ActivityKind
    payload_json  TEXT NOT NULL,   -- JSON payload (inner data only)
    custom_date   TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS titles_owner_idx      ON titles(owner_id);
CREATE INDEX IF NOT EXISTS episodes_season_idx   ON episodes(title_id, season_number);
CREATE INDEX IF NOT EXISTS activities_title_idx  ON activities(owner_id, title_id);

PRAGMA user_version = 1;
";
