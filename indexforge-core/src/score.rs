//! Composite scorer and preliminary weight allocator.

use crate::config::{ConfigError, FactorWeights};
use crate::error::{RebalanceError, Stage};
use crate::normalize::FactorScores;

/// Weighted sum of the three factor scores per company.
///
/// Factor weights are renormalized by their own sum, so `(2, 1, 1)` behaves
/// like `(0.5, 0.25, 0.25)`. Caller must have validated the weights.
pub fn composite_scores(scores: &FactorScores, weights: &FactorWeights) -> Vec<f64> {
    let w = weights.normalized();
    scores
        .segment
        .iter()
        .zip(&scores.cap)
        .zip(&scores.growth)
        .map(|((s, c), g)| s * w.segment + c * w.market_cap + g * w.growth)
        .collect()
}

/// Convert raw scores to preliminary weights summing to 1.
///
/// Scores must be in ticker order; the total is accumulated in that order.
/// A non-positive total means every weighted factor scored zero, which is a
/// caller configuration error rather than a data anomaly.
pub fn preliminary_weights(raw_scores: &[f64]) -> Result<Vec<f64>, RebalanceError> {
    let total: f64 = raw_scores.iter().sum();
    if !(total > 0.0) {
        return Err(RebalanceError::config(
            Stage::Scoring,
            ConfigError::NonPositiveScoreSum(total),
        ));
    }
    Ok(raw_scores.iter().map(|s| s / total).collect())
}
