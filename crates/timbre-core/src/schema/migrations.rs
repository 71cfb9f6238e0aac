/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Track embeddings (one row per live track)
CREATE TABLE IF NOT EXISTS tracks (
    track_id INTEGER PRIMARY KEY,
    embedding BLOB NOT NULL,
    updated_at TEXT NOT NULL
);

-- Applied events (append-only)
CREATE TABLE IF NOT EXISTS events (
    event_id TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

const MIGRATION_002: &str = r#"
-- Store-wide settings; `dimension` is fixed by the first insert
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tracks_and_events",
        sql: MIGRATION_001,
    },
    Migration {
        version: 2,
        name: "store_meta",
        sql: MIGRATION_002,
    },
];
