// Analysis pipeline — the single entry point that ties everything together.
//
// One analyze() call runs an ordered, short-circuiting sequence: classify,
// best-effort model update check, threat-feed fast path, then the
// type-specific analyzer. A feed hit wins outright: known-bad indicators
// return at high confidence without paying for inference.
//
// Analyzer errors propagate to the caller unmodified — "no verdict could
// be produced" is a different outcome than a confident "not malicious".

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::analyzers::{Analyzer, AnalyzerDeps, DomainAnalyzer, EmailAnalyzer, UrlAnalyzer};
use crate::classify::{classify, TargetKind};
use crate::db::models::{ThreatIndicator, Verdict};
use crate::error::ThreatError;
use crate::feeds::IndicatorStore;
use crate::registry::ModelRegistry;

/// Confidence assigned to a threat-feed match. Deliberately higher than
/// most model scores: a curated feed hit is stronger evidence than one
/// inference.
pub const FEED_MATCH_CONFIDENCE: f64 = 0.95;

pub struct ThreatPipeline {
    registry: Arc<ModelRegistry>,
    indicators: Arc<IndicatorStore>,
    domain_analyzer: DomainAnalyzer,
    url_analyzer: Arc<UrlAnalyzer>,
    email_analyzer: EmailAnalyzer,
}

impl ThreatPipeline {
    pub fn new(
        registry: Arc<ModelRegistry>,
        indicators: Arc<IndicatorStore>,
        deps: AnalyzerDeps,
    ) -> Self {
        let url_analyzer = Arc::new(UrlAnalyzer::new(deps.clone()));
        Self {
            registry,
            indicators,
            domain_analyzer: DomainAnalyzer::new(deps.clone()),
            email_analyzer: EmailAnalyzer::new(deps, Arc::clone(&url_analyzer)),
            url_analyzer,
        }
    }

    /// Analyze one target and synthesize a verdict.
    ///
    /// `kind` overrides classification when the caller already knows the
    /// type; `context` is carried into the audit trail unchanged.
    pub async fn analyze(
        &self,
        target: &str,
        kind: Option<TargetKind>,
        context: &Value,
    ) -> Result<Verdict> {
        let kind = kind.unwrap_or_else(|| classify(target));
        info!(kind = kind.as_str(), target, "Analyzing target");

        // Best-effort: serving with a stale model beats not serving.
        if let Err(e) = self.registry.check_for_updates().await {
            warn!(error = %e, "Model update check failed, continuing with current models");
        }

        // Threat-feed fast path. Email is the documented exception: the
        // feeds don't carry email indicators.
        if kind != TargetKind::Email {
            let matched = self.indicators.check(kind, target).await?;
            if matched.is_malicious {
                info!(kind = kind.as_str(), target, "Known-bad indicator, skipping analyzers");
                return Ok(feed_verdict(matched.indicator));
            }
        }

        match kind {
            TargetKind::Domain => self.domain_analyzer.analyze(target, context).await,
            TargetKind::Url => self.url_analyzer.analyze(target, context).await,
            TargetKind::Email => self.email_analyzer.analyze(target, context).await,
            // No ML analyzer exists for raw IP reputation: a bare IP that
            // isn't in the feeds gets a default benign verdict.
            TargetKind::Ip => Ok(default_ip_verdict()),
            TargetKind::Hash | TargetKind::Unknown => {
                Err(ThreatError::UnsupportedType(kind.as_str().to_string()).into())
            }
        }
    }
}

/// Build the verdict for a threat-feed hit.
fn feed_verdict(indicator: Option<ThreatIndicator>) -> Verdict {
    let threat_types = match &indicator {
        Some(i) => vec![i.threat_type.clone()],
        None => vec!["known_malicious".to_string()],
    };
    let details = indicator
        .map(|i| serde_json::to_value(i).unwrap_or(Value::Null))
        .unwrap_or(Value::Null);

    Verdict {
        is_malicious: true,
        confidence: FEED_MATCH_CONFIDENCE,
        threat_types,
        metadata: json!({ "source": "threat_feed", "details": details }),
        analyzed_at: Utc::now(),
        source: "threat-feed".to_string(),
    }
}

fn default_ip_verdict() -> Verdict {
    Verdict {
        is_malicious: false,
        confidence: 0.0,
        threat_types: vec![],
        metadata: json!({}),
        analyzed_at: Utc::now(),
        source: "basic-analysis".to_string(),
    }
}
