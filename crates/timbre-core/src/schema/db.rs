use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{Embedding, EventId, EventRecord, TrackId};
use crate::store::{CommitOutcome, EmbeddingStore, EventLog, Journal, Mutation, MutationOutcome};

use super::migrations::MIGRATIONS;

const DIMENSION_KEY: &str = "dimension";

/// A SQLite database holding the embedding store and the event log.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                let tx = self.conn.unchecked_transaction()?;
                tx.execute_batch(migration.sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    }
}

// Track rows. These helpers take a bare connection so they run unchanged
// inside a `commit` transaction.

fn stored_dimension(conn: &Connection) -> Result<Option<usize>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = ?1",
            [DIMENSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| Error::InvalidData(format!("corrupt stored dimension: {v}")))
        })
        .transpose()
}

fn check_dimension(conn: &Connection, embedding: &Embedding) -> Result<Option<usize>> {
    let dimension = stored_dimension(conn)?;
    match dimension {
        Some(expected) if expected != embedding.len() => Err(Error::SchemaViolation {
            expected,
            actual: embedding.len(),
        }),
        _ => Ok(dimension),
    }
}

fn track_exists(conn: &Connection, id: TrackId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM tracks WHERE track_id = ?1",
            [id.to_sql()?],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn insert_track(conn: &Connection, id: TrackId, embedding: &Embedding) -> Result<MutationOutcome> {
    let dimension = check_dimension(conn, embedding)?;
    if track_exists(conn, id)? {
        log::debug!("Insert of existing track {id} ignored");
        return Ok(MutationOutcome::NoOp);
    }

    if dimension.is_none() {
        log::info!("Establishing embedding dimension {}", embedding.len());
        conn.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2)",
            rusqlite::params![DIMENSION_KEY, embedding.len().to_string()],
        )?;
    }

    conn.execute(
        "INSERT INTO tracks (track_id, embedding, updated_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![id.to_sql()?, embedding.to_blob(), Utc::now().to_rfc3339()],
    )?;
    Ok(MutationOutcome::Changed)
}

fn update_track(conn: &Connection, id: TrackId, embedding: &Embedding) -> Result<MutationOutcome> {
    check_dimension(conn, embedding)?;
    let changed = conn.execute(
        "UPDATE tracks SET embedding = ?2, updated_at = ?3 WHERE track_id = ?1",
        rusqlite::params![id.to_sql()?, embedding.to_blob(), Utc::now().to_rfc3339()],
    )?;
    if changed == 0 {
        log::debug!("Update of missing track {id} ignored");
        return Ok(MutationOutcome::NoOp);
    }
    Ok(MutationOutcome::Changed)
}

fn delete_track(conn: &Connection, id: TrackId) -> Result<MutationOutcome> {
    let changed = conn.execute("DELETE FROM tracks WHERE track_id = ?1", [id.to_sql()?])?;
    if changed == 0 {
        log::debug!("Delete of missing track {id} ignored");
        return Ok(MutationOutcome::NoOp);
    }
    Ok(MutationOutcome::Changed)
}

fn apply_mutation(conn: &Connection, mutation: &Mutation) -> Result<MutationOutcome> {
    match mutation {
        Mutation::Insert(id, embedding) => insert_track(conn, *id, embedding),
        Mutation::Update(id, embedding) => update_track(conn, *id, embedding),
        Mutation::Delete(id) => delete_track(conn, *id),
    }
}

fn event_logged(conn: &Connection, event_id: &EventId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM events WHERE event_id = ?1",
            [event_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn log_event(conn: &Connection, event_id: &EventId) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO events (event_id, applied_at) VALUES (?1, ?2)",
        rusqlite::params![event_id.as_str(), Utc::now().to_rfc3339()],
    )?;
    Ok(inserted == 1)
}

impl EmbeddingStore for Database {
    fn insert(&self, id: TrackId, embedding: &Embedding) -> Result<MutationOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let outcome = insert_track(&tx, id, embedding)?;
        tx.commit()?;
        Ok(outcome)
    }

    fn update(&self, id: TrackId, embedding: &Embedding) -> Result<MutationOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let outcome = update_track(&tx, id, embedding)?;
        tx.commit()?;
        Ok(outcome)
    }

    fn delete(&self, id: TrackId) -> Result<MutationOutcome> {
        delete_track(&self.conn, id)
    }

    fn get(&self, id: TrackId) -> Result<Option<Embedding>> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT embedding FROM tracks WHERE track_id = ?1",
                [id.to_sql()?],
                |row| row.get(0),
            )
            .optional()?;
        blob.map(|b| Embedding::from_blob(&b)).transpose()
    }

    fn export(&self) -> Result<Vec<(TrackId, Embedding)>> {
        // A single SELECT reads one consistent snapshot of the table.
        let mut stmt = self
            .conn
            .prepare("SELECT track_id, embedding FROM tracks ORDER BY track_id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, blob)| Ok((TrackId::from_sql(id)?, Embedding::from_blob(&blob)?)))
            .collect()
    }

    fn dimension(&self) -> Result<Option<usize>> {
        stored_dimension(&self.conn)
    }

    fn track_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count.unsigned_abs())
    }
}

impl EventLog for Database {
    fn is_applied(&self, event_id: &EventId) -> Result<bool> {
        event_logged(&self.conn, event_id)
    }

    fn mark_applied(&self, event_id: &EventId) -> Result<bool> {
        log_event(&self.conn, event_id)
    }

    fn event_record(&self, event_id: &EventId) -> Result<Option<EventRecord>> {
        let applied_at: Option<String> = self
            .conn
            .query_row(
                "SELECT applied_at FROM events WHERE event_id = ?1",
                [event_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        applied_at
            .map(|ts| {
                let applied_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts)
                    .map_err(|e| Error::InvalidData(format!("bad applied_at {ts}: {e}")))?
                    .into();
                Ok(EventRecord {
                    event_id: event_id.clone(),
                    applied_at,
                })
            })
            .transpose()
    }

    fn event_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count.unsigned_abs())
    }
}

impl Journal for Database {
    fn commit(&self, event_id: &EventId, mutation: &Mutation) -> Result<CommitOutcome> {
        // Dropping `tx` without committing rolls everything back.
        let tx = self.conn.unchecked_transaction()?;
        if event_logged(&tx, event_id)? {
            return Ok(CommitOutcome::Duplicate);
        }

        let outcome = apply_mutation(&tx, mutation)?;
        if !log_event(&tx, event_id)? {
            return Ok(CommitOutcome::Duplicate);
        }
        tx.commit()?;

        Ok(CommitOutcome::Committed(outcome))
    }
}
