//! SQL schema for the Proxima SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS targets (
    target_id     TEXT PRIMARY KEY,
    owner_id      TEXT NOT NULL,
    name          TEXT NOT NULL,
    latitude      REAL NOT NULL,
    longitude     REAL NOT NULL,
    radius_meters REAL NOT NULL CHECK (radius_meters > 0),
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- Check-ins are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS check_ins (
    check_in_id     TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    target_id       TEXT NOT NULL REFERENCES targets(target_id),
    latitude        REAL NOT NULL,
    longitude       REAL NOT NULL,
    accuracy_meters REAL,
    method          TEXT NOT NULL,   -- 'gps' | 'qr'
    is_valid        INTEGER NOT NULL,
    address         TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS memberships (
    user_id   TEXT NOT NULL,
    group_id  TEXT NOT NULL REFERENCES targets(target_id),
    is_active INTEGER NOT NULL DEFAULT 1,
    joined_at TEXT NOT NULL,
    PRIMARY KEY (user_id, group_id)
);

CREATE TABLE IF NOT EXISTS meetings (
    meeting_id TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participants (
    participant_id TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL,
    meeting_id     TEXT NOT NULL REFERENCES meetings(meeting_id),
    nickname       TEXT NOT NULL,
    is_active      INTEGER NOT NULL DEFAULT 1,
    joined_at      TEXT NOT NULL,
    left_at        TEXT,
    UNIQUE (user_id, meeting_id)
);

CREATE TABLE IF NOT EXISTS feature_profiles (
    participant_id TEXT PRIMARY KEY REFERENCES participants(participant_id),
    my_features    TEXT NOT NULL,   -- JSON Features
    looking_for    TEXT NOT NULL,   -- JSON Features
    updated_at     TEXT NOT NULL
);

-- participant_low/high hold the pair in sorted order so the unique
-- constraint covers (a, b) and (b, a) alike.
CREATE TABLE IF NOT EXISTS auto_matches (
    auto_match_id    TEXT PRIMARY KEY,
    meeting_id       TEXT NOT NULL REFERENCES meetings(meeting_id),
    participant1_id  TEXT NOT NULL,
    participant2_id  TEXT NOT NULL,
    participant_low  TEXT NOT NULL,
    participant_high TEXT NOT NULL,
    chat_room_id     TEXT NOT NULL,
    matched_at       TEXT NOT NULL,
    UNIQUE (meeting_id, participant_low, participant_high),
    CHECK  (participant1_id != participant2_id)
);

CREATE TABLE IF NOT EXISTS match_attempts (
    attempt_id         TEXT PRIMARY KEY,
    meeting_id         TEXT NOT NULL,
    participant_id     TEXT NOT NULL,
    potential_matches  INTEGER NOT NULL,
    successful_matches INTEGER NOT NULL,
    created_at         TEXT NOT NULL
);

-- context_key is the group id, or '' for matches outside any group.
CREATE TABLE IF NOT EXISTS matches (
    match_id        TEXT PRIMARY KEY,
    user1_id        TEXT NOT NULL,
    user2_id        TEXT NOT NULL,
    user_low        TEXT NOT NULL,
    user_high       TEXT NOT NULL,
    group_id        TEXT,
    context_key     TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'active',  -- 'active' | 'expired' | 'deleted'
    message_count   INTEGER NOT NULL DEFAULT 0,
    last_message_at TEXT,
    created_at      TEXT NOT NULL,
    CHECK (user1_id != user2_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS matches_live_pair_idx
    ON matches(user_low, user_high, context_key)
    WHERE status != 'deleted';

-- Directory tables; other deployments read these from a user service.
CREATE TABLE IF NOT EXISTS users (
    user_id        TEXT PRIMARY KEY,
    nickname       TEXT NOT NULL,
    bio            TEXT,
    age            INTEGER,
    gender         TEXT,
    profile_image  TEXT,
    last_active_at TEXT
);

CREATE TABLE IF NOT EXISTS likes (
    from_user_id TEXT NOT NULL,
    to_user_id   TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (from_user_id, to_user_id)
);

CREATE INDEX IF NOT EXISTS check_ins_target_idx   ON check_ins(target_id, created_at);
CREATE INDEX IF NOT EXISTS check_ins_user_idx     ON check_ins(user_id, created_at);
CREATE INDEX IF NOT EXISTS participants_meeting_idx ON participants(meeting_id);
CREATE INDEX IF NOT EXISTS matches_user1_idx      ON matches(user1_id);
CREATE INDEX IF NOT EXISTS matches_user2_idx      ON matches(user2_id);
CREATE INDEX IF NOT EXISTS matches_status_idx     ON matches(status, created_at);

PRAGMA user_version = 1;
";
