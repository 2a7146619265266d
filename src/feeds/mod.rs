// Indicator store — cached threat-feed lookups with bounded refresh.
//
// Lookups hit the local cache first. A miss triggers at most one refresh
// (when the cache is stale) followed by exactly one retried lookup; the
// retry never recurses, so a missing indicator costs at most one refresh
// pass no matter how often it's queried.
//
// Concurrent refreshes are not mutually excluded. The merge is an upsert
// keyed by (kind, value), which makes overlapping passes idempotent — a
// deliberate trade of simplicity over exclusion.

pub mod source;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::classify::TargetKind;
use crate::db::models::ThreatIndicator;
use crate::db::Database;
use crate::error::ThreatError;
use source::FeedFetcher;

/// Pipeline-state key recording the last successful refresh, for `status`.
pub const LAST_REFRESH_STATE_KEY: &str = "last_feed_refresh";

/// The outcome of one indicator lookup.
#[derive(Debug, Clone)]
pub struct IndicatorMatch {
    pub is_malicious: bool,
    pub indicator: Option<ThreatIndicator>,
}

pub struct IndicatorStore {
    db: Arc<dyn Database>,
    fetcher: Arc<dyn FeedFetcher>,
    sources: Vec<String>,
    staleness: Duration,
    /// When the last successful refresh finished. None means never — the
    /// first miss after startup always refreshes.
    last_refresh: Mutex<Option<Instant>>,
}

impl IndicatorStore {
    pub fn new(
        db: Arc<dyn Database>,
        fetcher: Arc<dyn FeedFetcher>,
        sources: Vec<String>,
        staleness: Duration,
    ) -> Self {
        Self {
            db,
            fetcher,
            sources,
            staleness,
            last_refresh: Mutex::new(None),
        }
    }

    /// Check whether (kind, value) is a known-bad indicator.
    ///
    /// Cache hit: returns immediately, no network. Cache miss with fresh
    /// feeds: returns a non-match. Cache miss with stale feeds: one refresh,
    /// one retried lookup, then whatever the cache says.
    pub async fn check(&self, kind: TargetKind, value: &str) -> Result<IndicatorMatch> {
        if let Some(indicator) = self.db.find_active_indicator(kind.as_str(), value).await? {
            return Ok(IndicatorMatch {
                is_malicious: true,
                indicator: Some(indicator),
            });
        }

        if self.is_stale().await {
            self.refresh().await?;
            if let Some(indicator) = self.db.find_active_indicator(kind.as_str(), value).await? {
                return Ok(IndicatorMatch {
                    is_malicious: true,
                    indicator: Some(indicator),
                });
            }
        }

        Ok(IndicatorMatch {
            is_malicious: false,
            indicator: None,
        })
    }

    async fn is_stale(&self) -> bool {
        match *self.last_refresh.lock().await {
            Some(at) => at.elapsed() > self.staleness,
            None => true,
        }
    }

    /// Pull every configured feed source and merge the records into storage.
    ///
    /// Sources are fetched sequentially; a failing source is logged and
    /// skipped. Only when all of them fail does the refresh itself fail.
    /// Returns the number of records merged.
    pub async fn refresh(&self) -> Result<usize> {
        if self.sources.is_empty() {
            warn!("No threat feed sources configured");
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut merged = 0;
        let mut failed_sources = 0;

        for url in &self.sources {
            let records = match self.fetcher.fetch(url).await {
                Ok(records) => records,
                Err(e) => {
                    failed_sources += 1;
                    warn!(url = %url, error = %e, "Feed source unreachable, skipping");
                    continue;
                }
            };

            let mut from_source = 0;
            for record in records {
                if record.value.is_empty() {
                    warn!(url = %url, "Skipping feed record with no indicator value");
                    continue;
                }
                let indicator = record.into_indicator(url, &now);
                match self.db.upsert_indicator(&indicator).await {
                    Ok(()) => from_source += 1,
                    Err(e) => {
                        warn!(value = %indicator.value, error = %e, "Failed to save indicator")
                    }
                }
            }

            info!(url = %url, indicators = from_source, "Feed source merged");
            merged += from_source;
        }

        if failed_sources == self.sources.len() {
            return Err(ThreatError::FeedRefreshFailed {
                attempted: failed_sources,
            }
            .into());
        }

        *self.last_refresh.lock().await = Some(Instant::now());
        // Best-effort: the status display survives without this.
        if let Err(e) = self.db.set_state(LAST_REFRESH_STATE_KEY, &now).await {
            warn!(error = %e, "Failed to record feed refresh time");
        }

        info!(merged, "Threat feeds refreshed");
        Ok(merged)
    }
}
