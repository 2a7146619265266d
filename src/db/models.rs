// Data models — the types that flow through the application.
//
// They're separate from the database queries so other modules can use them
// without depending on rusqlite directly. Verdict is the one exception to
// "maps to a database row": it's the ephemeral result handed back to the
// caller and is never persisted by the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A known-bad value from a threat feed, cached locally.
///
/// Keyed by (kind, value). Rows are only ever written by feed ingestion
/// and soft-expired via `is_active` or `expires_at` — never deleted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatIndicator {
    pub kind: String,
    pub value: String,
    pub threat_type: String,
    /// Which feed URL this indicator came from.
    pub source: String,
    pub first_seen: String,
    pub last_seen: String,
    /// Feed-reported confidence, when the feed provides one.
    pub confidence: Option<f64>,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub expires_at: Option<String>,
}

/// One append-only audit entry per analyzer invocation.
///
/// Written on success and on inference failure alike; the monitor task
/// reads these back to recompute model metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    /// Name of the model that served (or failed to serve) this analysis.
    pub model: String,
    pub confidence: f64,
    /// The raw input plus the extracted feature map, as JSON.
    pub input: Value,
    /// The normalized analyzer output, or `{"error": ...}` on failure.
    pub output: Value,
    pub metadata: Value,
    pub is_training_data: bool,
    pub created_at: String,
}

/// The synthesized outcome of one analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub is_malicious: bool,
    /// Always in [0, 1]; clamped at the analyzer boundary.
    pub confidence: f64,
    pub threat_types: Vec<String>,
    pub metadata: Value,
    pub analyzed_at: DateTime<Utc>,
    /// The component that produced the final decision, e.g. "threat-feed"
    /// or "phishing-detector".
    pub source: String,
}
