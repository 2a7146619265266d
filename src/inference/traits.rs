// Inference backend trait — the swap-ready abstraction over the ML service.
//
// The HTTP implementation is the only production backend; tests substitute
// stub implementations with canned responses and call counters.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::registry::metrics::ModelMetrics;

/// Response from `GET /models/{name}/info`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfoResponse {
    /// Declared model version. An empty or missing version is treated as a
    /// load failure — a ready model must have one.
    #[serde(default)]
    pub version: String,
    /// Baseline metrics the backend may report alongside the version.
    #[serde(default)]
    pub metrics: Option<ModelMetrics>,
}

/// One entry from `GET /models/updates`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelUpdate {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelUpdatesResponse {
    #[serde(default)]
    pub updates: Vec<ModelUpdate>,
}

/// Response from an analyzer endpoint. The contract guarantees a numeric
/// `score`; everything else is optional and provider-specific.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceResponse {
    pub score: f64,
    #[serde(default)]
    pub is_malicious: Option<bool>,
    #[serde(default)]
    pub threat_types: Vec<String>,
    /// Any extra fields the backend returned, preserved for verdict metadata.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Remote inference capability reached through a request/response contract.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Fetch version and baseline metrics for one model.
    async fn model_info(&self, name: &str) -> Result<ModelInfoResponse>;

    /// List the model versions the backend currently serves.
    async fn model_updates(&self) -> Result<Vec<ModelUpdate>>;

    /// Ask the backend to retrain a model. Returns once the backend has
    /// accepted the request and finished the retrain call.
    async fn retrain(&self, name: &str) -> Result<()>;

    /// Run inference: POST the payload (features + model + version) to an
    /// analyzer endpoint.
    async fn infer(&self, endpoint: &str, payload: &Value) -> Result<InferenceResponse>;
}
