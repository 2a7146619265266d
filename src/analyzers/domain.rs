// Domain analyzer — lexical features over a bare domain name.
//
// The features are deliberately cheap: lengths, label counts, and
// character-class flags. The model does the actual judgement; when the
// backend doesn't flag the result itself, a score at or above 0.5 counts
// as malicious.

use serde_json::{json, Value};

use super::{Analyzer, AnalyzerDeps, Assessment, Features};
use crate::inference::InferenceResponse;

/// Score at or above this is malicious when the backend doesn't say.
const SCORE_THRESHOLD: f64 = 0.5;

pub struct DomainAnalyzer {
    deps: AnalyzerDeps,
}

impl DomainAnalyzer {
    pub fn new(deps: AnalyzerDeps) -> Self {
        Self { deps }
    }
}

impl Analyzer for DomainAnalyzer {
    fn source_id(&self) -> &'static str {
        "domain-analyzer"
    }

    fn model_name(&self) -> &'static str {
        "domain-analyzer"
    }

    fn endpoint(&self) -> &'static str {
        "/analyze/domain"
    }

    fn deps(&self) -> &AnalyzerDeps {
        &self.deps
    }

    fn preprocess(&self, domain: &str) -> Features {
        let labels: Vec<&str> = domain.split('.').collect();
        let tld = labels.last().copied().unwrap_or("");
        let sld = if labels.len() >= 2 {
            labels[labels.len() - 2]
        } else {
            ""
        };
        // Labels left of the registrable part: www.a.example.com has two
        let subdomain_count = labels.len().saturating_sub(2);

        let mut features = Features::new();
        features.insert("domain".to_string(), json!(domain));
        features.insert("domain_length".to_string(), json!(domain.len()));
        features.insert("tld_length".to_string(), json!(tld.len()));
        features.insert("sld_length".to_string(), json!(sld.len()));
        features.insert("has_hyphen".to_string(), json!(domain.contains('-')));
        features.insert(
            "has_digit".to_string(),
            json!(domain.bytes().any(|b| b.is_ascii_digit())),
        );
        features.insert("subdomain_count".to_string(), json!(subdomain_count));
        features
    }

    fn postprocess(&self, response: &InferenceResponse) -> Assessment {
        Assessment {
            is_malicious: response
                .is_malicious
                .unwrap_or(response.score >= SCORE_THRESHOLD),
            confidence: response.score,
            threat_types: response.threat_types.clone(),
            details: if response.extra.is_empty() {
                Value::Null
            } else {
                Value::Object(response.extra.clone())
            },
        }
    }
}
