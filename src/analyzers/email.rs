// Email analyzer — content markers plus embedded-URL delegation.
//
// The input is the raw message text (or just an address). Features cover
// the sender/recipient domains and link/attachment markers; the model sees
// those, and any embedded URL additionally goes through the URL analyzer.
// The final verdict is the worse of the two — a clean-looking email
// carrying a phishing link is a phishing email.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::url::UrlAnalyzer;
use super::{run_model_analysis, Analyzer, AnalyzerDeps, Assessment, Features};
use crate::db::models::Verdict;
use crate::inference::InferenceResponse;

/// Backend score strictly above this is declared phishing.
const PHISHING_THRESHOLD: f64 = 0.7;

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9][A-Za-z0-9.-]*").expect("valid regex")
    })
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("valid regex"))
}

/// First embedded http(s) URL in the message, if any.
pub fn extract_url(body: &str) -> Option<&str> {
    link_re().find(body).map(|m| m.as_str())
}

/// Domain part of the nth address appearing in the message.
fn nth_address_domain(body: &str, n: usize) -> String {
    address_re()
        .find_iter(body)
        .nth(n)
        .and_then(|m| m.as_str().split_once('@'))
        .map(|(_, domain)| domain.to_string())
        .unwrap_or_default()
}

pub struct EmailAnalyzer {
    deps: AnalyzerDeps,
    url_analyzer: Arc<UrlAnalyzer>,
}

impl EmailAnalyzer {
    pub fn new(deps: AnalyzerDeps, url_analyzer: Arc<UrlAnalyzer>) -> Self {
        Self { deps, url_analyzer }
    }
}

#[async_trait]
impl Analyzer for EmailAnalyzer {
    fn source_id(&self) -> &'static str {
        "email-analyzer"
    }

    fn model_name(&self) -> &'static str {
        "phishing-detector"
    }

    fn endpoint(&self) -> &'static str {
        "/analyze/email"
    }

    fn deps(&self) -> &AnalyzerDeps {
        &self.deps
    }

    fn preprocess(&self, email: &str) -> Features {
        let mut features = Features::new();
        features.insert("body_length".to_string(), json!(email.len()));
        features.insert("has_links".to_string(), json!(link_re().is_match(email)));
        features.insert(
            "has_attachments".to_string(),
            json!(email.to_ascii_lowercase().contains("attachment")),
        );
        features.insert("from_domain".to_string(), json!(nth_address_domain(email, 0)));
        features.insert("to_domain".to_string(), json!(nth_address_domain(email, 1)));
        features
    }

    fn postprocess(&self, response: &InferenceResponse) -> Assessment {
        let is_phishing = response.score > PHISHING_THRESHOLD;
        let mut threat_types = response.threat_types.clone();
        if is_phishing && threat_types.is_empty() {
            threat_types.push("phishing".to_string());
        }
        Assessment {
            is_malicious: is_phishing,
            confidence: response.score,
            threat_types,
            details: if response.extra.is_empty() {
                Value::Null
            } else {
                Value::Object(response.extra.clone())
            },
        }
    }

    async fn analyze(&self, input: &str, context: &Value) -> Result<Verdict> {
        let verdict = run_model_analysis(self, input, context).await?;

        let Some(url) = extract_url(input) else {
            return Ok(verdict);
        };

        debug!(url, "Email contains an embedded URL, delegating");

        let mut url_context = match context {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        url_context.insert("embedded_in_email".to_string(), json!(true));

        let url_verdict = self
            .url_analyzer
            .analyze(url, &Value::Object(url_context))
            .await?;

        Ok(compose_verdicts(verdict, url_verdict, url))
    }
}

/// Merge the email's own verdict with the embedded URL's.
///
/// The worse of the two wins: malicious beats benign, ties go to the higher
/// confidence. The result keeps the email analyzer as its source and
/// records the embedded-URL outcome in metadata either way.
fn compose_verdicts(email: Verdict, url: Verdict, embedded_url: &str) -> Verdict {
    let url_summary = json!({
        "url": embedded_url,
        "is_malicious": url.is_malicious,
        "confidence": url.confidence,
        "source": url.source,
    });

    let url_is_worse = (url.is_malicious && !email.is_malicious)
        || (url.is_malicious == email.is_malicious && url.confidence > email.confidence);

    let mut composed = if url_is_worse {
        let mut threat_types = email.threat_types.clone();
        for t in &url.threat_types {
            if !threat_types.contains(t) {
                threat_types.push(t.clone());
            }
        }
        Verdict {
            is_malicious: url.is_malicious,
            confidence: url.confidence,
            threat_types,
            ..email
        }
    } else {
        email
    };

    if let Value::Object(map) = &mut composed.metadata {
        map.insert("embedded_url".to_string(), url_summary);
    }
    composed
}
