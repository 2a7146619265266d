// SqliteDatabase — rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is
// !Send. Trait methods lock the mutex, do synchronous rusqlite work, and
// return; the lock is never held across .await points.
//
// The free functions in queries.rs remain the source of truth for SQL, so
// unit tests can exercise them against a Connection directly.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{AnalysisRecord, ThreatIndicator};
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

/// Current time in the RFC 3339 UTC format all rows use.
fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn get_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        super::queries::get_state(&conn, key)
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_state(&conn, key, value)
    }

    async fn find_active_indicator(
        &self,
        kind: &str,
        value: &str,
    ) -> Result<Option<ThreatIndicator>> {
        let now = now_utc();
        let conn = self.conn.lock().await;
        super::queries::find_active_indicator(&conn, kind, value, &now)
    }

    async fn upsert_indicator(&self, indicator: &ThreatIndicator) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::upsert_indicator(&conn, indicator)
    }

    async fn indicator_counts(&self) -> Result<(i64, i64)> {
        let now = now_utc();
        let conn = self.conn.lock().await;
        super::queries::indicator_counts(&conn, &now)
    }

    async fn insert_analysis(&self, record: &AnalysisRecord) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::insert_analysis(&conn, record)
    }

    async fn recent_analyses(&self, model: &str, limit: u32) -> Result<Vec<AnalysisRecord>> {
        let conn = self.conn.lock().await;
        super::queries::recent_analyses(&conn, model, limit)
    }

    async fn analysis_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::analysis_count(&conn)
    }
}
