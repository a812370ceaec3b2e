//! Factor normalizer — pure functions mapping raw factors to 0–100 scores.
//!
//! All scaling is cross-sectional: relative to the current eligible set only.
//! Scores are not comparable across rebalance dates or universes.
//!
//! When every value in the set is identical the min–max range collapses;
//! every company then scores 100 rather than 0 or NaN.

use crate::config::GrowthClip;
use crate::filter::EligibleCompany;

/// Score assigned to every company when a factor has zero spread.
pub const DEGENERATE_SCORE: f64 = 100.0;

/// Per-company factor scores, index-aligned with the eligible set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorScores {
    pub segment: Vec<f64>,
    pub cap: Vec<f64>,
    pub growth: Vec<f64>,
}

impl FactorScores {
    pub fn len(&self) -> usize {
        self.segment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segment.is_empty()
    }
}

/// Normalize all three factors for the eligible set.
pub fn normalize_factors(eligible: &[EligibleCompany], clip: &GrowthClip) -> FactorScores {
    let caps: Vec<f64> = eligible.iter().map(|c| c.market_cap).collect();
    let growth: Vec<f64> = eligible.iter().map(|c| c.growth(clip.measure)).collect();

    FactorScores {
        segment: eligible.iter().map(|c| c.segment_revenue_pct).collect(),
        cap: log_cap_scores(&caps),
        growth: clipped_growth_scores(&growth, clip.floor, clip.ceiling),
    }
}

/// log10 then min–max scale. Caps must be positive (the filter guarantees it).
pub fn log_cap_scores(market_caps: &[f64]) -> Vec<f64> {
    let logs: Vec<f64> = market_caps.iter().map(|c| c.log10()).collect();
    min_max_scores(&logs)
}

/// Clip to `[floor, ceiling]`, then min–max scale.
pub fn clipped_growth_scores(growth_rates: &[f64], floor: f64, ceiling: f64) -> Vec<f64> {
    let clipped: Vec<f64> = growth_rates.iter().map(|g| g.clamp(floor, ceiling)).collect();
    min_max_scores(&clipped)
}

/// Min–max scale to 0–100. Zero spread yields [`DEGENERATE_SCORE`] for all.
pub fn min_max_scores(values: &[f64]) -> Vec<f64> {
    let Some((min, max)) = bounds(values) else {
        return Vec::new();
    };
    let range = max - min;
    // Relative tolerance: rounding in log10 can leave a few ulps on equal inputs.
    let scale = max.abs().max(min.abs()).max(1.0);
    if range <= scale * 1e-12 {
        return vec![DEGENERATE_SCORE; values.len()];
    }
    values
        .iter()
        .map(|v| ((v - min) / range * 100.0).clamp(0.0, 100.0))
        .collect()
}

fn bounds(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}
