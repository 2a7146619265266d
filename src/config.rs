use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Central configuration loaded from environment variables.
///
/// All settings come from env vars; the .env file is loaded automatically
/// at startup via dotenvy. Everything has a default, so `basalt init` and
/// `basalt analyze` work out of the box against a local inference backend.
pub struct Config {
    /// Base URL of the ML inference backend.
    pub backend_url: String,
    /// Model names to load at startup.
    pub model_names: Vec<String>,
    /// Threat feed source URLs, each returning a JSON array of indicators.
    pub feed_urls: Vec<String>,
    /// How old the last successful feed refresh may be before a cache miss
    /// triggers a new refresh.
    pub feed_staleness: Duration,
    /// Refresh cadence for the resident `watch` mode.
    pub feed_refresh: Duration,
    /// Wall-clock budget for a single backend or feed HTTP call.
    pub request_timeout: Duration,
    pub db_path: String,
}

const DEFAULT_BACKEND_URL: &str = "http://ml-service:5000";
const DEFAULT_MODELS: &str = "domain-analyzer,phishing-detector";

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Ok(Self {
            backend_url: env::var("BASALT_BACKEND_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
            model_names: split_list(
                &env::var("BASALT_MODELS").unwrap_or_else(|_| DEFAULT_MODELS.to_string()),
            ),
            feed_urls: split_list(&env::var("BASALT_FEED_URLS").unwrap_or_default()),
            feed_staleness: env_secs("BASALT_FEED_STALENESS_SECS", 3600)?,
            feed_refresh: env_secs("BASALT_FEED_REFRESH_SECS", 3600)?,
            request_timeout: env_secs("BASALT_REQUEST_TIMEOUT_SECS", 5)?,
            db_path: env::var("BASALT_DB_PATH").unwrap_or_else(|_| "./basalt.db".to_string()),
        })
    }

    /// Check that at least one feed source is configured.
    /// Call this before any operation that exists only to refresh feeds.
    pub fn require_feeds(&self) -> Result<()> {
        if self.feed_urls.is_empty() {
            anyhow::bail!(
                "BASALT_FEED_URLS not set. Add a comma-separated list of feed\n\
                 source URLs to your .env file."
            );
        }
        Ok(())
    }
}

/// Parse a duration in whole seconds from an env var, with a default.
fn env_secs(key: &str, default_secs: u64) -> Result<Duration> {
    match env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{key} must be a number of seconds, got {raw:?}"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

/// Split a comma-separated env value into trimmed, non-empty entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_empties() {
        assert_eq!(
            split_list("a.example, b.example ,,c.example"),
            vec!["a.example", "b.example", "c.example"]
        );
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }
}
