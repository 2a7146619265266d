// Error taxonomy for the analysis pipeline.
//
// These variants travel inside anyhow errors so call sites keep their
// `anyhow::Result` signatures; callers that need to distinguish failure
// modes (tests, the orchestrator) downcast with `err.downcast_ref`.
//
// Not every failure is a variant here. Per-source feed failures and
// classification ambiguity are handled where they occur and never surface
// as errors at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThreatError {
    /// Every configured feed source failed during one refresh pass.
    /// Individual source failures are logged and skipped; only the
    /// all-sources case is fatal.
    #[error("threat feed refresh failed: all {attempted} sources unreachable")]
    FeedRefreshFailed { attempted: usize },

    /// A model could not be loaded from the inference backend. Isolated
    /// per model; the next scheduled update pass retries.
    #[error("failed to load model {name}: {message}")]
    ModelLoadFailed { name: String, message: String },

    /// The inference backend call behind a single analyze request failed.
    #[error("{analyzer}: inference backend unavailable: {message}")]
    InferenceUnavailable { analyzer: String, message: String },

    /// The caller forced a type no analyzer exists for.
    #[error("unsupported threat type: {0}")]
    UnsupportedType(String),
}
