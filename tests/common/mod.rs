// Shared test fixtures — stub backend, stub feed fetcher, and a wired
// pipeline over an in-memory database.
//
// The stubs implement the same traits the HTTP clients do, with canned
// responses and call counters, so every pipeline behavior is testable
// without network access.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use basalt::analyzers::AnalyzerDeps;
use basalt::db::models::ThreatIndicator;
use basalt::db::{schema, Database, SqliteDatabase};
use basalt::feeds::source::{FeedFetcher, FeedRecord};
use basalt::feeds::IndicatorStore;
use basalt::inference::{InferenceBackend, InferenceResponse, ModelInfoResponse, ModelUpdate};
use basalt::pipeline::ThreatPipeline;
use basalt::registry::ModelRegistry;

/// Inference backend stub with programmable responses.
#[derive(Default)]
pub struct StubBackend {
    /// model name -> Ok(version) | Err(message)
    infos: Mutex<HashMap<String, Result<String, String>>>,
    updates: Mutex<Vec<ModelUpdate>>,
    /// endpoint -> score
    scores: Mutex<HashMap<String, f64>>,
    pub info_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub infer_calls: AtomicUsize,
    pub retrain_calls: AtomicUsize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(self, name: &str, version: &str) -> Self {
        self.set_model_ok(name, version);
        self
    }

    pub fn set_model_ok(&self, name: &str, version: &str) {
        self.infos
            .lock()
            .unwrap()
            .insert(name.to_string(), Ok(version.to_string()));
    }

    pub fn set_model_err(&self, name: &str, message: &str) {
        self.infos
            .lock()
            .unwrap()
            .insert(name.to_string(), Err(message.to_string()));
    }

    pub fn set_updates(&self, updates: Vec<(&str, &str)>) {
        *self.updates.lock().unwrap() = updates
            .into_iter()
            .map(|(name, version)| ModelUpdate {
                name: name.to_string(),
                version: version.to_string(),
            })
            .collect();
    }

    pub fn set_score(&self, endpoint: &str, score: f64) {
        self.scores
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), score);
    }
}

#[async_trait]
impl InferenceBackend for StubBackend {
    async fn model_info(&self, name: &str) -> Result<ModelInfoResponse> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        match self.infos.lock().unwrap().get(name) {
            Some(Ok(version)) => Ok(ModelInfoResponse {
                version: version.clone(),
                metrics: None,
            }),
            Some(Err(message)) => anyhow::bail!("{message}"),
            None => anyhow::bail!("unknown model {name}"),
        }
    }

    async fn model_updates(&self) -> Result<Vec<ModelUpdate>> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.updates.lock().unwrap().clone())
    }

    async fn retrain(&self, _name: &str) -> Result<()> {
        self.retrain_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn infer(&self, endpoint: &str, _payload: &Value) -> Result<InferenceResponse> {
        self.infer_calls.fetch_add(1, Ordering::SeqCst);
        match self.scores.lock().unwrap().get(endpoint) {
            Some(score) => Ok(InferenceResponse {
                score: *score,
                is_malicious: None,
                threat_types: vec![],
                extra: serde_json::Map::new(),
            }),
            None => anyhow::bail!("backend down: no response for {endpoint}"),
        }
    }
}

/// Feed fetcher stub: each URL maps to a JSON array or an error.
#[derive(Default)]
pub struct StubFetcher {
    /// url -> Ok(json array) | Err(message)
    responses: Mutex<HashMap<String, Result<String, String>>>,
    pub fetch_calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_records(&self, url: &str, records_json: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(records_json.to_string()));
    }

    pub fn set_error(&self, url: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(message.to_string()));
    }
}

#[async_trait]
impl FeedFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().get(url) {
            Some(Ok(json)) => Ok(serde_json::from_str(json)?),
            Some(Err(message)) => anyhow::bail!("{message}"),
            None => anyhow::bail!("no feed programmed for {url}"),
        }
    }
}

/// Fresh in-memory database with the full schema applied.
pub fn memory_db() -> Arc<dyn Database> {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    schema::create_tables(&conn).unwrap();
    Arc::new(SqliteDatabase::new(conn))
}

/// An indicator row the way feed ingestion would write it.
pub fn indicator(kind: &str, value: &str, threat_type: &str) -> ThreatIndicator {
    ThreatIndicator {
        kind: kind.to_string(),
        value: value.to_string(),
        threat_type: threat_type.to_string(),
        source: "https://feed.test/v1".to_string(),
        first_seen: "2026-08-01T00:00:00Z".to_string(),
        last_seen: "2026-08-01T00:00:00Z".to_string(),
        confidence: Some(0.9),
        tags: vec![],
        is_active: true,
        expires_at: None,
    }
}

/// Everything a pipeline test needs, wired over the stubs.
pub struct Harness {
    pub backend: Arc<StubBackend>,
    pub fetcher: Arc<StubFetcher>,
    pub store: Arc<dyn Database>,
    pub registry: Arc<ModelRegistry>,
    pub indicators: Arc<IndicatorStore>,
    pub pipeline: ThreatPipeline,
}

/// Build a full pipeline over stubs. `staleness` controls when a cache
/// miss triggers a refresh; tests that must avoid refreshes pass a long
/// duration and prime the store, tests that need one pass zero.
pub fn harness(feed_urls: Vec<String>, staleness: Duration) -> Harness {
    let backend = Arc::new(
        StubBackend::new()
            .with_model("domain-analyzer", "1.0.0")
            .with_model("phishing-detector", "1.0.0"),
    );
    let fetcher = Arc::new(StubFetcher::new());
    let store = memory_db();

    let indicators = Arc::new(IndicatorStore::new(
        Arc::clone(&store),
        Arc::clone(&fetcher) as Arc<dyn FeedFetcher>,
        feed_urls,
        staleness,
    ));
    let registry = Arc::new(ModelRegistry::new(
        Arc::clone(&backend) as Arc<dyn InferenceBackend>,
        Arc::clone(&store),
        vec![
            "domain-analyzer".to_string(),
            "phishing-detector".to_string(),
        ],
    ));

    let deps = AnalyzerDeps {
        backend: Arc::clone(&backend) as Arc<dyn InferenceBackend>,
        store: Arc::clone(&store),
        registry: Arc::clone(&registry),
    };
    let pipeline = ThreatPipeline::new(Arc::clone(&registry), Arc::clone(&indicators), deps);

    Harness {
        backend,
        fetcher,
        store,
        registry,
        indicators,
        pipeline,
    }
}
