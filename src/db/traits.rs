// Database trait — backend-agnostic async interface for all DB operations.
//
// Implemented by SqliteDatabase (wraps rusqlite). All methods are async so
// the pipeline never cares that the default backend does synchronous work
// under a mutex, and tests can substitute lighter fakes where useful.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{AnalysisRecord, ThreatIndicator};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Pipeline state ---

    /// Get a pipeline state value by key (e.g., "last_feed_refresh").
    async fn get_state(&self, key: &str) -> Result<Option<String>>;

    /// Set a pipeline state value (upsert).
    async fn set_state(&self, key: &str, value: &str) -> Result<()>;

    // --- Threat indicators ---

    /// Look up an active, unexpired indicator by (kind, value).
    async fn find_active_indicator(
        &self,
        kind: &str,
        value: &str,
    ) -> Result<Option<ThreatIndicator>>;

    /// Insert or reactivate an indicator keyed by (kind, value).
    async fn upsert_indicator(&self, indicator: &ThreatIndicator) -> Result<()>;

    /// (total, active) indicator counts.
    async fn indicator_counts(&self) -> Result<(i64, i64)>;

    // --- Analysis audit trail ---

    /// Append one analysis record; returns its ID. Records are never mutated.
    async fn insert_analysis(&self, record: &AnalysisRecord) -> Result<i64>;

    /// The most recent records for one model, newest first.
    async fn recent_analyses(&self, model: &str, limit: u32) -> Result<Vec<AnalysisRecord>>;

    /// Total number of analysis records.
    async fn analysis_count(&self) -> Result<i64>;
}
