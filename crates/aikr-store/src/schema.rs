use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    // Checkpoint every ~400KB instead of the default ~4MB
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Fold any stale WAL into the main file. In-memory and fresh databases
    // legitimately fail this, so errors are ignored.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::info!("startup WAL checkpoint complete");
    }

    // Terms are stored as their JSON form; positions keep bag insertion
    // order so eviction tie-breaks survive a reload.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS concepts (
            term        TEXT PRIMARY KEY,
            position    INTEGER NOT NULL,
            priority    REAL NOT NULL,
            activation  REAL NOT NULL,
            idle_ticks  INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS sentences (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            concept      TEXT NOT NULL REFERENCES concepts(term),
            bag          TEXT NOT NULL CHECK (bag IN ('task', 'belief')),
            position     INTEGER NOT NULL,
            term         TEXT NOT NULL,
            punctuation  TEXT NOT NULL,
            frequency    REAL,
            confidence   REAL,
            priority     REAL NOT NULL,
            durability   REAL NOT NULL,
            quality      REAL NOT NULL,
            bag_priority REAL NOT NULL,
            stamp_id     INTEGER NOT NULL,
            evidence     TEXT NOT NULL,
            created_at   INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_sentence_concept ON sentences(concept, bag, position);
        CREATE INDEX IF NOT EXISTS idx_sentence_term ON sentences(term);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}
