// Target classification — maps an arbitrary identifier to a threat type.
//
// Pure heuristics, no I/O, never fails. The checks run in a fixed priority
// order and the first match wins; anything that matches nothing falls back
// to Domain, preserving the upstream contract that every input gets a type.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// The kind of identifier being analyzed.
///
/// `Unknown` is accepted from callers that force a type but is never
/// produced by [`classify`] — unmatched input defaults to `Domain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Domain,
    Url,
    Ip,
    Email,
    Hash,
    Unknown,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Domain => "domain",
            TargetKind::Url => "url",
            TargetKind::Ip => "ip",
            TargetKind::Email => "email",
            TargetKind::Hash => "hash",
            TargetKind::Unknown => "unknown",
        }
    }

    /// Parse a caller-supplied kind string (e.g. from the CLI `--kind` flag).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "domain" => Some(TargetKind::Domain),
            "url" => Some(TargetKind::Url),
            "ip" => Some(TargetKind::Ip),
            "email" => Some(TargetKind::Email),
            "hash" => Some(TargetKind::Hash),
            "unknown" => Some(TargetKind::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn ipv4_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").expect("valid regex"))
}

fn domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[a-z0-9]+([-.][a-z0-9]+)*\.[a-z]{2,}$").expect("valid regex")
    })
}

/// True for hex digests of the common lengths (MD5, SHA-1, SHA-256).
fn is_hex_digest(input: &str) -> bool {
    matches!(input.len(), 32 | 40 | 64) && input.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Classify an identifier by type.
///
/// Priority order, first match wins:
/// `@` → email, URL scheme → url, dotted quad → ip, hex digest → hash,
/// domain grammar → domain. Anything else defaults to domain.
///
/// The `@` check runs first on purpose: `a@1.2.3.4` is an email, not an IP.
pub fn classify(input: &str) -> TargetKind {
    if input.contains('@') {
        return TargetKind::Email;
    }
    if input.starts_with("http://") || input.starts_with("https://") {
        return TargetKind::Url;
    }
    if ipv4_re().is_match(input) {
        return TargetKind::Ip;
    }
    if is_hex_digest(input) {
        return TargetKind::Hash;
    }
    if domain_re().is_match(input) {
        return TargetKind::Domain;
    }

    TargetKind::Domain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_wins_over_everything() {
        assert_eq!(classify("user@example.com"), TargetKind::Email);
        // Contains an IP, but the @ check has priority
        assert_eq!(classify("a@1.2.3.4"), TargetKind::Email);
        // Even inside a URL-looking string
        assert_eq!(classify("admin@https.example.org"), TargetKind::Email);
    }

    #[test]
    fn url_schemes() {
        assert_eq!(classify("http://example.com/login"), TargetKind::Url);
        assert_eq!(classify("https://evil.test/?q=1"), TargetKind::Url);
        // Other schemes are not recognized as URLs
        assert_eq!(classify("ftp://example.com"), TargetKind::Domain);
    }

    #[test]
    fn dotted_quad_is_ip() {
        assert_eq!(classify("192.168.1.1"), TargetKind::Ip);
        assert_eq!(classify("8.8.8.8"), TargetKind::Ip);
        // Five octets fail the dotted-quad pattern and fall through
        assert_ne!(classify("1.2.3.4.5"), TargetKind::Ip);
    }

    #[test]
    fn hex_digests() {
        assert_eq!(classify(&"a".repeat(32)), TargetKind::Hash); // MD5
        assert_eq!(classify(&"B".repeat(40)), TargetKind::Hash); // SHA-1, uppercase ok
        assert_eq!(classify(&"0".repeat(64)), TargetKind::Hash); // SHA-256
        assert_ne!(classify(&"a".repeat(33)), TargetKind::Hash);
        assert_ne!(classify(&"g".repeat(32)), TargetKind::Hash);
    }

    #[test]
    fn domains() {
        assert_eq!(classify("example.com"), TargetKind::Domain);
        assert_eq!(classify("sub.example-site.co.uk"), TargetKind::Domain);
    }

    #[test]
    fn unmatched_defaults_to_domain() {
        assert_eq!(classify("not a domain at all"), TargetKind::Domain);
        assert_eq!(classify(""), TargetKind::Domain);
        assert_eq!(classify("???"), TargetKind::Domain);
    }

    #[test]
    fn classifier_never_returns_unknown() {
        for input in ["", "x", "a@b", "1.2.3.4", "example.com", "%%%"] {
            assert_ne!(classify(input), TargetKind::Unknown, "input: {input:?}");
        }
    }

    #[test]
    fn kind_parse_round_trips() {
        for kind in [
            TargetKind::Domain,
            TargetKind::Url,
            TargetKind::Ip,
            TargetKind::Email,
            TargetKind::Hash,
            TargetKind::Unknown,
        ] {
            assert_eq!(TargetKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TargetKind::parse("DOMAIN"), Some(TargetKind::Domain));
        assert_eq!(TargetKind::parse("file"), None);
    }
}
