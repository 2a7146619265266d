// URL/phishing analyzer — structural features over a full URL.
//
// The URL is split by hand (scheme, authority, path, query, fragment)
// rather than strictly validated: phishing URLs are exactly the inputs a
// strict parser rejects, and a feature extractor that errors on hostile
// input defeats its purpose.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::{json, Value};

use super::{Analyzer, AnalyzerDeps, Assessment, Features};
use crate::inference::InferenceResponse;

/// Backend score strictly above this is declared phishing.
pub const PHISHING_THRESHOLD: f64 = 0.7;

fn embedded_ip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").expect("valid regex"))
}

pub struct UrlAnalyzer {
    deps: AnalyzerDeps,
}

impl UrlAnalyzer {
    pub fn new(deps: AnalyzerDeps) -> Self {
        Self { deps }
    }
}

struct UrlParts<'a> {
    host: &'a str,
    port: Option<&'a str>,
    path: &'a str,
    has_query: bool,
    has_fragment: bool,
}

/// Split a URL into its structural parts. Never fails; missing parts come
/// back empty, which the feature map represents faithfully.
fn split_url(url: &str) -> UrlParts<'_> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    let (rest, fragment) = match rest.split_once('#') {
        Some((before, frag)) => (before, Some(frag)),
        None => (rest, None),
    };
    let (rest, query) = match rest.split_once('?') {
        Some((before, q)) => (before, Some(q)),
        None => (rest, None),
    };
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };

    // Userinfo before '@' is not part of the host
    let host_port = match authority.rsplit_once('@') {
        Some((_, hp)) => hp,
        None => authority,
    };
    let (host, port) = match host_port.rsplit_once(':') {
        Some((h, p)) if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) => (h, Some(p)),
        _ => (host_port, None),
    };

    UrlParts {
        host,
        port,
        path,
        has_query: query.is_some(),
        has_fragment: fragment.is_some(),
    }
}

/// True when the URL carries an explicit port that isn't the scheme default.
fn has_nondefault_port(url: &str, port: Option<&str>) -> bool {
    match port {
        Some("80") => !url.starts_with("http://"),
        Some("443") => !url.starts_with("https://"),
        Some(_) => true,
        None => false,
    }
}

impl Analyzer for UrlAnalyzer {
    fn source_id(&self) -> &'static str {
        "phishing-detector"
    }

    fn model_name(&self) -> &'static str {
        "phishing-detector"
    }

    fn endpoint(&self) -> &'static str {
        "/detect/phishing/url"
    }

    fn deps(&self) -> &AnalyzerDeps {
        &self.deps
    }

    fn preprocess(&self, url: &str) -> Features {
        let parts = split_url(url);

        let mut features = Features::new();
        features.insert("url".to_string(), json!(url));
        features.insert("url_length".to_string(), json!(url.len()));
        features.insert("domain_length".to_string(), json!(parts.host.len()));
        features.insert("path_length".to_string(), json!(parts.path.len()));
        features.insert(
            "has_port".to_string(),
            json!(has_nondefault_port(url, parts.port)),
        );
        features.insert("has_query".to_string(), json!(parts.has_query));
        features.insert("has_fragment".to_string(), json!(parts.has_fragment));
        features.insert("has_at_symbol".to_string(), json!(url.contains('@')));
        features.insert("has_ip".to_string(), json!(embedded_ip_re().is_match(url)));
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_a_plain_url() {
        let parts = split_url("https://example.com/login");
        assert_eq!(parts.host, "example.com");
        assert_eq!(parts.path, "/login");
        assert!(parts.port.is_none());
        assert!(!parts.has_query);
        assert!(!parts.has_fragment);
    }

    #[test]
    fn splits_query_fragment_and_port() {
        let parts = split_url("http://evil.test:8080/a/b?c=1#frag");
        assert_eq!(parts.host, "evil.test");
        assert_eq!(parts.port, Some("8080"));
        assert_eq!(parts.path, "/a/b");
        assert!(parts.has_query);
        assert!(parts.has_fragment);
    }

    #[test]
    fn userinfo_is_not_the_host() {
        let parts = split_url("http://user@evil.test/");
        assert_eq!(parts.host, "evil.test");
    }

    #[test]
    fn default_ports_do_not_count() {
        assert!(!has_nondefault_port("http://a.test:80/", Some("80")));
        assert!(!has_nondefault_port("https://a.test:443/", Some("443")));
        assert!(has_nondefault_port("https://a.test:80/", Some("80")));
        assert!(has_nondefault_port("http://a.test:8080/", Some("8080")));
        assert!(!has_nondefault_port("http://a.test/", None));
    }

    #[test]
    fn embedded_ip_detection() {
        assert!(embedded_ip_re().is_match("http://192.168.0.1/login"));
        assert!(!embedded_ip_re().is_match("http://example.com/login"));
    }
}
