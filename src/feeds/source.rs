// Feed source access — fetching and parsing external indicator feeds.
//
// Feeds are plain HTTP endpoints returning a JSON array of records. The
// format is lenient by design: real feeds disagree on field names, so the
// value may arrive as `indicator` or `value`, and most fields have
// serviceable defaults.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::db::models::ThreatIndicator;

/// One record as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedRecord {
    /// Indicator kind ("domain", "ip", ...). Unspecified kinds are kept as
    /// "unknown" rather than dropped — the lookup key never matches them,
    /// but the provenance is preserved.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// The indicator itself. Feeds name this field either `indicator` or
    /// `value`; records with neither are skipped at merge time.
    #[serde(default, alias = "indicator")]
    pub value: String,
    #[serde(default)]
    pub threat_type: Option<String>,
    #[serde(default)]
    pub first_seen: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    /// Nested provenance block some feeds use instead of top-level fields.
    #[serde(default)]
    pub metadata: Option<FeedRecordMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedRecordMetadata {
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FeedRecord {
    /// Convert a wire record into a storage row.
    ///
    /// `source` is the feed URL the record came from; `now` fills in
    /// missing first/last-seen timestamps. Top-level fields win over the
    /// nested metadata block when both are present.
    pub fn into_indicator(self, source: &str, now: &str) -> ThreatIndicator {
        let nested = self.metadata.unwrap_or_default();
        ThreatIndicator {
            kind: self.kind.unwrap_or_else(|| "unknown".to_string()),
            value: self.value,
            threat_type: self.threat_type.unwrap_or_else(|| "malicious".to_string()),
            source: source.to_string(),
            first_seen: self.first_seen.unwrap_or_else(|| now.to_string()),
            last_seen: self.last_seen.unwrap_or_else(|| now.to_string()),
            confidence: self.confidence.or(nested.confidence),
            tags: if self.tags.is_empty() {
                nested.tags
            } else {
                self.tags
            },
            is_active: true,
            expires_at: self.expires_at,
        }
    }
}

/// Trait for fetching one feed source. The HTTP implementation is the only
/// production fetcher; tests substitute stubs with canned records and call
/// counters.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedRecord>>;
}

pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("basalt/0.1 (threat-intel)")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedRecord>> {
        debug!(url, "Fetching threat feed");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Feed request failed: {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("Feed {url} returned {status}");
        }

        response
            .json::<Vec<FeedRecord>>()
            .await
            .with_context(|| format!("Failed to parse feed response from {url}"))
    }
}
