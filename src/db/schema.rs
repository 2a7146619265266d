// Database schema — table creation and migrations.
//
// A `schema_version` table tracks applied migrations; each migration is a
// function that executes SQL statements. There is only v1 so far, but the
// machinery is in place for additive changes.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent — safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Locally cached threat indicators, merged in from feed sources.
        -- Rows are soft-expired (is_active = 0 or expires_at in the past),
        -- never deleted by the pipeline.
        CREATE TABLE IF NOT EXISTS threat_indicators (
            kind TEXT NOT NULL,                -- domain / url / ip / hash
            value TEXT NOT NULL,
            threat_type TEXT NOT NULL,         -- e.g. phishing, malware, c2
            source TEXT NOT NULL DEFAULT '',   -- feed URL of origin
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            confidence REAL,                   -- feed-reported, 0.0 to 1.0
            tags TEXT NOT NULL DEFAULT '[]',   -- JSON array
            is_active INTEGER NOT NULL DEFAULT 1,
            expires_at TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (kind, value)
        );

        -- Append-only audit trail of analyzer invocations.
        -- The monitor task reads the most recent rows per model back out
        -- to recompute rolling metrics.
        CREATE TABLE IF NOT EXISTS analysis_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model TEXT NOT NULL,
            confidence REAL NOT NULL,
            input TEXT NOT NULL,               -- JSON: raw input + features
            output TEXT NOT NULL,              -- JSON: normalized result or error
            metadata TEXT NOT NULL DEFAULT '{}',
            is_training_data INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        -- Pipeline state — last feed refresh timestamp and similar
        CREATE TABLE IF NOT EXISTS pipeline_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Index for the active-indicator lookup on the analyze hot path
        CREATE INDEX IF NOT EXISTS idx_indicators_active
            ON threat_indicators(kind, value, is_active);

        -- Index for reading recent analyses per model
        CREATE INDEX IF NOT EXISTS idx_analysis_model
            ON analysis_records(model, id);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
