// Per-type analyzers — feature extraction plus a remote inference call.
//
// Each analyzer implements the Analyzer trait: a pure `preprocess` that
// turns the raw input into a feature map, a `postprocess` that normalizes
// the backend response, and a provided `analyze` driver that wires them to
// the inference backend and the audit trail. The orchestrator picks an
// analyzer by type tag; there is no dispatch hierarchy beyond that.
//
// Every invocation appends exactly one AnalysisRecord — on success and on
// backend failure alike — so the monitor task sees the full picture.

pub mod domain;
pub mod email;
pub mod url;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::db::models::{AnalysisRecord, Verdict};
use crate::db::Database;
use crate::error::ThreatError;
use crate::inference::{InferenceBackend, InferenceResponse};
use crate::registry::ModelRegistry;

pub use domain::DomainAnalyzer;
pub use email::EmailAnalyzer;
pub use url::UrlAnalyzer;

/// A flat feature map, posted to the backend alongside model and version.
pub type Features = Map<String, Value>;

/// Normalized analyzer output, before it becomes a Verdict.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub is_malicious: bool,
    pub confidence: f64,
    pub threat_types: Vec<String>,
    /// Extra backend-reported fields, carried into verdict metadata.
    pub details: Value,
}

/// Shared collaborators every analyzer needs.
#[derive(Clone)]
pub struct AnalyzerDeps {
    pub backend: Arc<dyn InferenceBackend>,
    pub store: Arc<dyn Database>,
    pub registry: Arc<ModelRegistry>,
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Identifier recorded as the verdict source, e.g. "domain-analyzer".
    fn source_id(&self) -> &'static str;

    /// Registry name of the model this analyzer serves through.
    fn model_name(&self) -> &'static str;

    /// Backend endpoint path, e.g. "/analyze/domain".
    fn endpoint(&self) -> &'static str;

    fn deps(&self) -> &AnalyzerDeps;

    /// Extract the feature map from the raw input. Pure and synchronous.
    fn preprocess(&self, input: &str) -> Features;

    /// Normalize the backend response into verdict fields.
    fn postprocess(&self, response: &InferenceResponse) -> Assessment;

    /// Run the full analysis: preprocess, call the backend, postprocess,
    /// record the audit entry, and build the verdict.
    async fn analyze(&self, input: &str, context: &Value) -> Result<Verdict> {
        run_model_analysis(self, input, context).await
    }
}

/// The shared driver behind every analyzer's `analyze`.
///
/// Split out as a free function so variants that override `analyze` (the
/// email analyzer composes an embedded-URL verdict on top) can still reuse
/// the base flow.
pub(crate) async fn run_model_analysis<A>(
    analyzer: &A,
    input: &str,
    context: &Value,
) -> Result<Verdict>
where
    A: Analyzer + ?Sized,
{
    let deps = analyzer.deps();
    let features = analyzer.preprocess(input);

    let model = deps.registry.get(analyzer.model_name()).await;
    let (version, model_status) = match &model {
        Some(m) => (m.version.clone(), m.status.as_str().to_string()),
        None => ("unknown".to_string(), "unknown".to_string()),
    };

    let mut payload = Map::new();
    payload.extend(features.clone());
    payload.insert("model".to_string(), json!(analyzer.model_name()));
    payload.insert("version".to_string(), json!(version));

    debug!(
        analyzer = analyzer.source_id(),
        model = analyzer.model_name(),
        version = %version,
        "Calling inference backend"
    );

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    match deps
        .backend
        .infer(analyzer.endpoint(), &Value::Object(payload))
        .await
    {
        Ok(response) => {
            let mut assessment = analyzer.postprocess(&response);
            assessment.confidence = assessment.confidence.clamp(0.0, 1.0);

            let record = AnalysisRecord {
                id: 0,
                model: analyzer.model_name().to_string(),
                confidence: assessment.confidence,
                input: json!({ "input": input, "features": features }),
                output: json!({
                    "is_malicious": assessment.is_malicious,
                    "confidence": assessment.confidence,
                    "threat_types": assessment.threat_types.clone(),
                }),
                metadata: json!({
                    "analyzer": analyzer.source_id(),
                    "model_version": version,
                    "context": context,
                }),
                is_training_data: false,
                created_at: now,
            };
            deps.store
                .insert_analysis(&record)
                .await
                .context("Failed to record analysis")?;

            let mut metadata = Map::new();
            metadata.insert("model_version".to_string(), json!(version));
            metadata.insert("model_status".to_string(), json!(model_status));
            if !assessment.details.is_null() {
                metadata.insert("details".to_string(), assessment.details.clone());
            }

            Ok(Verdict {
                is_malicious: assessment.is_malicious,
                confidence: assessment.confidence,
                threat_types: assessment.threat_types,
                metadata: Value::Object(metadata),
                analyzed_at: Utc::now(),
                source: analyzer.source_id().to_string(),
            })
        }
        Err(e) => {
            // The audit entry is written for failures too; a failed write
            // must not mask the inference error, so it only warns.
            let record = AnalysisRecord {
                id: 0,
                model: analyzer.model_name().to_string(),
                confidence: 0.0,
                input: json!({ "input": input, "features": features }),
                output: json!({ "error": e.to_string() }),
                metadata: json!({
                    "analyzer": analyzer.source_id(),
                    "model_version": version,
                    "context": context,
                }),
                is_training_data: false,
                created_at: now,
            };
            if let Err(log_err) = deps.store.insert_analysis(&record).await {
                warn!(error = %log_err, "Failed to record failed analysis");
            }

            Err(ThreatError::InferenceUnavailable {
                analyzer: analyzer.source_id().to_string(),
                message: e.to_string(),
            }
            .into())
        }
    }
}
