// Rolling model metrics, recomputed from the analysis audit trail.
//
// Only records that carry a ground-truth label contribute — a prediction
// with no feedback tells us nothing about accuracy. The label lives in the
// record's metadata as `ground_truth: bool` and is compared against the
// recorded `is_malicious` output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::AnalysisRecord;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    #[serde(alias = "f1Score")]
    pub f1_score: f64,
    /// How many labeled records the numbers were computed from.
    #[serde(default)]
    pub sample_size: usize,
}

/// Compute metrics over a batch of analysis records.
///
/// Returns None when no record in the batch is labeled — callers keep the
/// previous metrics in that case rather than overwriting them with noise.
pub fn compute(records: &[AnalysisRecord]) -> Option<ModelMetrics> {
    let mut tp = 0u32;
    let mut fp = 0u32;
    let mut tn = 0u32;
    let mut fn_ = 0u32;

    for record in records {
        let Some(predicted) = record.output.get("is_malicious").and_then(Value::as_bool) else {
            continue;
        };
        let Some(actual) = record.metadata.get("ground_truth").and_then(Value::as_bool) else {
            continue;
        };
        match (predicted, actual) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }

    let total = tp + fp + tn + fn_;
    if total == 0 {
        return None;
    }

    let accuracy = f64::from(tp + tn) / f64::from(total);
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Some(ModelMetrics {
        accuracy,
        precision,
        recall,
        f1_score,
        sample_size: total as usize,
    })
}

fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        f64::from(numerator) / f64::from(denominator)
    }
}
