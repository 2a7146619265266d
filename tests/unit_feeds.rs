// Unit tests for feed parsing and the indicator store's refresh discipline.
//
// The store is exercised through a stub fetcher with call counters, so the
// tests can assert not just what was found but how many network round
// trips it cost.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use basalt::classify::TargetKind;
use basalt::db::Database;
use basalt::error::ThreatError;
use basalt::feeds::source::FeedRecord;

use common::{harness, indicator};

const NEVER_STALE: Duration = Duration::from_secs(60 * 60 * 24);

// ============================================================
// Feed record parsing
// ============================================================

#[test]
fn record_accepts_indicator_field_name() {
    let record: FeedRecord = serde_json::from_str(
        r#"{"type": "domain", "indicator": "evil.test", "threat_type": "phishing"}"#,
    )
    .unwrap();
    assert_eq!(record.value, "evil.test");

    let converted = record.into_indicator("https://feed.test/v1", "2026-08-06T00:00:00Z");
    assert_eq!(converted.kind, "domain");
    assert_eq!(converted.threat_type, "phishing");
    assert_eq!(converted.source, "https://feed.test/v1");
    assert!(converted.is_active);
}

#[test]
fn record_accepts_value_field_name() {
    let record: FeedRecord =
        serde_json::from_str(r#"{"type": "ip", "value": "203.0.113.7"}"#).unwrap();
    assert_eq!(record.value, "203.0.113.7");
}

#[test]
fn record_defaults_fill_missing_fields() {
    let record: FeedRecord = serde_json::from_str(r#"{"value": "evil.test"}"#).unwrap();
    let converted = record.into_indicator("https://feed.test/v1", "2026-08-06T00:00:00Z");

    assert_eq!(converted.kind, "unknown");
    assert_eq!(converted.threat_type, "malicious");
    assert_eq!(converted.first_seen, "2026-08-06T00:00:00Z");
    assert_eq!(converted.last_seen, "2026-08-06T00:00:00Z");
    assert!(converted.confidence.is_none());
}

#[test]
fn record_reads_nested_metadata_block() {
    let record: FeedRecord = serde_json::from_str(
        r#"{"type": "domain", "indicator": "evil.test",
            "metadata": {"confidence": 0.8, "tags": ["botnet"]}}"#,
    )
    .unwrap();
    let converted = record.into_indicator("https://feed.test/v1", "2026-08-06T00:00:00Z");
    assert_eq!(converted.confidence, Some(0.8));
    assert_eq!(converted.tags, vec!["botnet"]);
}

#[test]
fn top_level_fields_win_over_nested_metadata() {
    let record: FeedRecord = serde_json::from_str(
        r#"{"indicator": "evil.test", "confidence": 0.95,
            "metadata": {"confidence": 0.5}}"#,
    )
    .unwrap();
    let converted = record.into_indicator("https://feed.test/v1", "2026-08-06T00:00:00Z");
    assert_eq!(converted.confidence, Some(0.95));
}

// ============================================================
// Lookup and refresh discipline
// ============================================================

#[tokio::test]
async fn seeded_indicator_hits_with_zero_fetches() {
    let h = harness(vec!["https://feed.test/v1".to_string()], NEVER_STALE);
    h.store
        .upsert_indicator(&indicator("domain", "evil.test", "phishing"))
        .await
        .unwrap();

    let result = h
        .indicators
        .check(TargetKind::Domain, "evil.test")
        .await
        .unwrap();

    assert!(result.is_malicious);
    assert_eq!(result.indicator.unwrap().threat_type, "phishing");
    assert_eq!(h.fetcher.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stale_miss_refreshes_exactly_once() {
    // Zero staleness: every miss sees a stale cache
    let h = harness(vec!["https://feed.test/v1".to_string()], Duration::ZERO);
    h.fetcher.set_records("https://feed.test/v1", "[]");

    let result = h
        .indicators
        .check(TargetKind::Domain, "unknown.test")
        .await
        .unwrap();

    // One refresh pass, one retried lookup, then a definitive miss —
    // never an unbounded retry chain
    assert!(!result.is_malicious);
    assert_eq!(h.fetcher.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_makes_new_indicator_visible_to_the_retried_lookup() {
    let h = harness(vec!["https://feed.test/v1".to_string()], Duration::ZERO);
    h.fetcher.set_records(
        "https://feed.test/v1",
        r#"[{"type": "domain", "indicator": "fresh.test", "threat_type": "malware"}]"#,
    );

    let result = h
        .indicators
        .check(TargetKind::Domain, "fresh.test")
        .await
        .unwrap();

    assert!(result.is_malicious);
    assert_eq!(result.indicator.unwrap().threat_type, "malware");
    assert_eq!(h.fetcher.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fresh_cache_miss_does_not_refresh() {
    let h = harness(vec!["https://feed.test/v1".to_string()], NEVER_STALE);
    h.fetcher.set_records("https://feed.test/v1", "[]");

    // Prime the store so the last-refresh timestamp is recent
    h.indicators.refresh().await.unwrap();
    assert_eq!(h.fetcher.fetch_calls.load(Ordering::SeqCst), 1);

    let result = h
        .indicators
        .check(TargetKind::Domain, "unknown.test")
        .await
        .unwrap();

    assert!(!result.is_malicious);
    // Still one: the miss did not trigger another pull
    assert_eq!(h.fetcher.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn one_failing_source_is_skipped() {
    let h = harness(
        vec![
            "https://down.test/feed".to_string(),
            "https://up.test/feed".to_string(),
        ],
        NEVER_STALE,
    );
    h.fetcher.set_error("https://down.test/feed", "connection refused");
    h.fetcher.set_records(
        "https://up.test/feed",
        r#"[{"type": "ip", "indicator": "203.0.113.7"}]"#,
    );

    let merged = h.indicators.refresh().await.unwrap();
    assert_eq!(merged, 1);

    let result = h
        .indicators
        .check(TargetKind::Ip, "203.0.113.7")
        .await
        .unwrap();
    assert!(result.is_malicious);
}

#[tokio::test]
async fn refresh_fails_only_when_all_sources_fail() {
    let h = harness(
        vec![
            "https://down1.test/feed".to_string(),
            "https://down2.test/feed".to_string(),
        ],
        NEVER_STALE,
    );
    h.fetcher.set_error("https://down1.test/feed", "timeout");
    h.fetcher.set_error("https://down2.test/feed", "dns failure");

    let err = h.indicators.refresh().await.unwrap_err();
    match err.downcast_ref::<ThreatError>() {
        Some(ThreatError::FeedRefreshFailed { attempted }) => assert_eq!(*attempted, 2),
        other => panic!("expected FeedRefreshFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn records_without_a_value_are_skipped() {
    let h = harness(vec!["https://feed.test/v1".to_string()], NEVER_STALE);
    h.fetcher.set_records(
        "https://feed.test/v1",
        r#"[{"type": "domain"}, {"type": "domain", "indicator": "kept.test"}]"#,
    );

    let merged = h.indicators.refresh().await.unwrap();
    assert_eq!(merged, 1);
}

#[tokio::test]
async fn overlapping_refreshes_are_idempotent() {
    let h = harness(vec!["https://feed.test/v1".to_string()], NEVER_STALE);
    h.fetcher.set_records(
        "https://feed.test/v1",
        r#"[{"type": "domain", "indicator": "evil.test", "threat_type": "phishing"}]"#,
    );

    h.indicators.refresh().await.unwrap();
    h.indicators.refresh().await.unwrap();

    // The upsert by (kind, value) merged the second pass into the first row
    let (total, active) = h.store.indicator_counts().await.unwrap();
    assert_eq!((total, active), (1, 1));
}
