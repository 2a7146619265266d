// Model registry — lifecycle management for the named inference models.
//
// The registry owns the only shared mutable state in the process: a map of
// model descriptors behind an RwLock. Writes happen exclusively inside
// registry methods (load / update-check / monitor); everything else reads
// through cloning accessors. Scheduled maintenance runs in spawned tasks
// whose failures are logged and never reach a request in flight.

pub mod metrics;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::error::ThreatError;
use crate::inference::InferenceBackend;
use metrics::ModelMetrics;

/// How often the backend is polled for new model versions.
const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// How often rolling metrics are recomputed from the audit trail.
const MONITOR_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
/// How many recent analysis records feed one metrics computation.
const MONITOR_SAMPLE_SIZE: u32 = 1000;
/// Accuracy below this triggers a retrain.
const ACCURACY_FLOOR: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Loading,
    Ready,
    Error,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Loading => "loading",
            ModelStatus::Ready => "ready",
            ModelStatus::Error => "error",
        }
    }
}

/// One named model's lifecycle state. Mutated only by the registry.
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    pub name: String,
    /// Non-empty whenever status is Ready.
    pub version: String,
    pub status: ModelStatus,
    pub last_updated: DateTime<Utc>,
    pub metrics: Option<ModelMetrics>,
    pub last_error: Option<String>,
}

pub struct ModelRegistry {
    backend: Arc<dyn InferenceBackend>,
    store: Arc<dyn Database>,
    names: Vec<String>,
    models: RwLock<HashMap<String, ModelDescriptor>>,
}

impl ModelRegistry {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        store: Arc<dyn Database>,
        names: Vec<String>,
    ) -> Self {
        Self {
            backend,
            store,
            names,
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Load all configured models concurrently.
    ///
    /// One model's failure leaves it in Error without blocking the others;
    /// load_all itself never fails.
    pub async fn load_all(&self) {
        let results = join_all(self.names.iter().map(|name| self.load_model(name))).await;
        let ready = results.iter().filter(|r| r.is_ok()).count();
        info!(
            ready,
            total = self.names.len(),
            "Model initialization complete"
        );
    }

    /// Load (or reload) one model from the backend.
    ///
    /// Transitions: previous state → Loading → Ready on success, → Error on
    /// failure. A Ready descriptor always carries a non-empty version, so an
    /// info response without one counts as a failure.
    pub async fn load_model(&self, name: &str) -> Result<ModelDescriptor> {
        {
            let mut models = self.models.write().await;
            let entry = models
                .entry(name.to_string())
                .or_insert_with(|| ModelDescriptor {
                    name: name.to_string(),
                    version: String::new(),
                    status: ModelStatus::Loading,
                    last_updated: Utc::now(),
                    metrics: None,
                    last_error: None,
                });
            entry.status = ModelStatus::Loading;
            entry.last_updated = Utc::now();
        }

        let outcome = match self.backend.model_info(name).await {
            Ok(info) if info.version.is_empty() => {
                Err("backend reported no version for this model".to_string())
            }
            Ok(info) => Ok(info),
            Err(e) => Err(e.to_string()),
        };

        let mut models = self.models.write().await;
        // The entry was inserted above; a concurrent reload may have
        // replaced it, but the key is always present.
        let entry = models
            .entry(name.to_string())
            .or_insert_with(|| ModelDescriptor {
                name: name.to_string(),
                version: String::new(),
                status: ModelStatus::Loading,
                last_updated: Utc::now(),
                metrics: None,
                last_error: None,
            });

        match outcome {
            Ok(info) => {
                entry.version = info.version;
                entry.status = ModelStatus::Ready;
                entry.last_updated = Utc::now();
                entry.last_error = None;
                if info.metrics.is_some() {
                    entry.metrics = info.metrics;
                }
                info!(model = name, version = %entry.version, "Model loaded");
                Ok(entry.clone())
            }
            Err(message) => {
                entry.status = ModelStatus::Error;
                entry.last_updated = Utc::now();
                entry.last_error = Some(message.clone());
                error!(model = name, error = %message, "Failed to load model");
                Err(ThreatError::ModelLoadFailed {
                    name: name.to_string(),
                    message,
                }
                .into())
            }
        }
    }

    /// Get one model's descriptor (cloned out of the shared map).
    pub async fn get(&self, name: &str) -> Option<ModelDescriptor> {
        self.models.read().await.get(name).cloned()
    }

    /// All descriptors, sorted by name for stable display.
    pub async fn all(&self) -> Vec<ModelDescriptor> {
        let mut models: Vec<ModelDescriptor> =
            self.models.read().await.values().cloned().collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }

    /// Poll the backend for available model versions and reload any model
    /// whose declared version differs from ours (or that we've never seen).
    ///
    /// Returns the number of models reloaded. Per-model reload failures are
    /// logged and skipped; only the updates query itself can fail.
    pub async fn check_for_updates(&self) -> Result<usize> {
        let updates = self
            .backend
            .model_updates()
            .await
            .context("Failed to check for model updates")?;

        let mut reloaded = 0;
        for update in &updates {
            let needs_reload = {
                let models = self.models.read().await;
                models
                    .get(&update.name)
                    .map(|m| m.version != update.version)
                    .unwrap_or(true)
            };
            if !needs_reload {
                continue;
            }

            info!(
                model = %update.name,
                version = %update.version,
                "Model version changed, reloading"
            );
            match self.load_model(&update.name).await {
                Ok(_) => reloaded += 1,
                Err(e) => warn!(model = %update.name, error = %e, "Model reload failed"),
            }
        }

        debug!(
            available = updates.len(),
            reloaded, "Model update check complete"
        );
        Ok(reloaded)
    }

    /// Recompute rolling metrics for every model and retrain any model
    /// whose accuracy fell below the floor.
    ///
    /// Never fails: each model's monitoring errors are logged and leave
    /// that model's prior status and metrics untouched.
    pub async fn monitor_performance(&self) {
        let names: Vec<String> = self.models.read().await.keys().cloned().collect();

        for name in names {
            if let Err(e) = self.monitor_model(&name).await {
                error!(model = %name, error = %e, "Model monitoring failed");
            }
        }
    }

    async fn monitor_model(&self, name: &str) -> Result<()> {
        let records = self.store.recent_analyses(name, MONITOR_SAMPLE_SIZE).await?;

        let Some(computed) = metrics::compute(&records) else {
            debug!(model = name, "No labeled analyses yet, keeping previous metrics");
            return Ok(());
        };

        {
            let mut models = self.models.write().await;
            if let Some(entry) = models.get_mut(name) {
                entry.metrics = Some(computed);
            }
        }

        info!(
            model = name,
            accuracy = computed.accuracy,
            precision = computed.precision,
            recall = computed.recall,
            f1 = computed.f1_score,
            samples = computed.sample_size,
            "Model performance recomputed"
        );

        if computed.accuracy < ACCURACY_FLOOR {
            warn!(
                model = name,
                accuracy = computed.accuracy,
                "Accuracy below retrain threshold"
            );
            self.backend
                .retrain(name)
                .await
                .with_context(|| format!("Retrain request failed for {name}"))?;
            self.load_model(name).await?;
            info!(model = name, "Model retrained and reloaded");
        }

        Ok(())
    }

    /// Spawn the repeating maintenance tasks: hourly update checks and
    /// six-hourly performance monitoring.
    ///
    /// Both tasks swallow and log their own failures. The returned handles
    /// let the caller cancel them on shutdown.
    pub fn spawn_maintenance(self: Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let registry = Arc::clone(&self);
        let update_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(UPDATE_CHECK_INTERVAL);
            // The first tick completes immediately; models were just loaded,
            // so skip it and start checking an hour from now.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = registry.check_for_updates().await {
                    warn!(error = %e, "Scheduled model update check failed");
                }
            }
        });

        let registry = self;
        let monitor_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.monitor_performance().await;
            }
        });

        (update_task, monitor_task)
    }
}
