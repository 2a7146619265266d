// Database queries — CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust
// interfaces. The functions take a plain &Connection so unit tests can run
// them against an in-memory database.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{AnalysisRecord, ThreatIndicator};

// --- Pipeline state ---

/// Get a pipeline state value by key (e.g., "last_feed_refresh").
pub fn get_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM pipeline_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a pipeline state value (upsert).
pub fn set_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO pipeline_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

// --- Threat indicators ---

/// Look up an active indicator by (kind, value).
///
/// Active means `is_active = 1` and not past `expires_at`. `now` is an
/// RFC 3339 UTC timestamp; expiry is a lexicographic comparison, which is
/// sound because all timestamps are written in the same format.
pub fn find_active_indicator(
    conn: &Connection,
    kind: &str,
    value: &str,
    now: &str,
) -> Result<Option<ThreatIndicator>> {
    let mut stmt = conn.prepare(
        "SELECT kind, value, threat_type, source, first_seen, last_seen,
                confidence, tags, is_active, expires_at
         FROM threat_indicators
         WHERE kind = ?1 AND value = ?2 AND is_active = 1
           AND (expires_at IS NULL OR expires_at > ?3)",
    )?;
    let result = stmt
        .query_row(params![kind, value, now], indicator_from_row)
        .optional()?;
    Ok(result)
}

/// Insert or update an indicator keyed by (kind, value).
///
/// A matching row is reactivated and gets a fresh last_seen; first_seen is
/// preserved from the original sighting. The upsert is what makes
/// overlapping refreshes idempotent.
pub fn upsert_indicator(conn: &Connection, indicator: &ThreatIndicator) -> Result<()> {
    let tags_json = serde_json::to_string(&indicator.tags)?;
    conn.execute(
        "INSERT INTO threat_indicators
             (kind, value, threat_type, source, first_seen, last_seen,
              confidence, tags, is_active, expires_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, datetime('now'))
         ON CONFLICT(kind, value) DO UPDATE SET
            threat_type = ?3,
            source = ?4,
            last_seen = ?6,
            confidence = ?7,
            tags = ?8,
            is_active = 1,
            expires_at = ?9,
            updated_at = datetime('now')",
        params![
            indicator.kind,
            indicator.value,
            indicator.threat_type,
            indicator.source,
            indicator.first_seen,
            indicator.last_seen,
            indicator.confidence,
            tags_json,
            indicator.expires_at,
        ],
    )?;
    Ok(())
}

/// Total and active indicator counts, for the status display.
pub fn indicator_counts(conn: &Connection, now: &str) -> Result<(i64, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM threat_indicators", [], |row| {
        row.get(0)
    })?;
    let active: i64 = conn.query_row(
        "SELECT COUNT(*) FROM threat_indicators
         WHERE is_active = 1 AND (expires_at IS NULL OR expires_at > ?1)",
        params![now],
        |row| row.get(0),
    )?;
    Ok((total, active))
}

fn indicator_from_row(row: &Row<'_>) -> rusqlite::Result<ThreatIndicator> {
    let tags_json: String = row.get(7)?;
    Ok(ThreatIndicator {
        kind: row.get(0)?,
        value: row.get(1)?,
        threat_type: row.get(2)?,
        source: row.get(3)?,
        first_seen: row.get(4)?,
        last_seen: row.get(5)?,
        confidence: row.get(6)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        is_active: row.get(8)?,
        expires_at: row.get(9)?,
    })
}

// --- Analysis records ---

/// Append one analysis record and return its ID. Records are never updated.
pub fn insert_analysis(conn: &Connection, record: &AnalysisRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO analysis_records
             (model, confidence, input, output, metadata, is_training_data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.model,
            record.confidence,
            serde_json::to_string(&record.input)?,
            serde_json::to_string(&record.output)?,
            serde_json::to_string(&record.metadata)?,
            record.is_training_data,
            record.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get the most recent analysis records for one model, newest first.
pub fn recent_analyses(conn: &Connection, model: &str, limit: u32) -> Result<Vec<AnalysisRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, model, confidence, input, output, metadata, is_training_data, created_at
         FROM analysis_records
         WHERE model = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![model, limit], |row| {
        let input_json: String = row.get(3)?;
        let output_json: String = row.get(4)?;
        let metadata_json: String = row.get(5)?;
        Ok(AnalysisRecord {
            id: row.get(0)?,
            model: row.get(1)?,
            confidence: row.get(2)?,
            input: serde_json::from_str(&input_json).unwrap_or_default(),
            output: serde_json::from_str(&output_json).unwrap_or_default(),
            metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
            is_training_data: row.get(6)?,
            created_at: row.get(7)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Total number of analysis records, for the status display.
pub fn analysis_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM analysis_records", [], |row| {
        row.get(0)
    })?;
    Ok(count)
}
