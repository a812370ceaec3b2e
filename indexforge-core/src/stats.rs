//! Summary statistics over a finished composition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::Constituent;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub num_constituents: usize,
    pub total_weight: f64,
    pub weighted_avg_market_cap: f64,
    pub weighted_avg_segment_revenue_pct: f64,
    /// Weighted average of the growth figure the run used (YoY or 3y CAGR).
    pub weighted_avg_growth: f64,
    pub max_weight: f64,
    pub min_weight: f64,
    /// Σ w². 1/n for an equal-weight index, 1.0 for a single name.
    pub herfindahl: f64,
    /// 1 / Herfindahl.
    pub effective_holdings: f64,
    /// Total weight carrying each segment tag. A constituent tagged with two
    /// segments counts toward both, so these need not sum to 1.
    pub segment_exposure: BTreeMap<String, f64>,
}

impl SummaryStats {
    /// Compute over constituents in any order; sums run in ticker order.
    pub fn compute(constituents: &[Constituent]) -> Self {
        if constituents.is_empty() {
            return Self::default();
        }
        let mut rows: Vec<&Constituent> = constituents.iter().collect();
        rows.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        let mut stats = Self {
            num_constituents: rows.len(),
            min_weight: f64::INFINITY,
            max_weight: f64::NEG_INFINITY,
            ..Default::default()
        };
        for c in &rows {
            let w = c.weight;
            stats.total_weight += w;
            stats.weighted_avg_market_cap += w * c.factors.market_cap;
            stats.weighted_avg_segment_revenue_pct += w * c.factors.segment_revenue_pct;
            stats.weighted_avg_growth += w * c.factors.revenue_growth;
            stats.herfindahl += w * w;
            stats.max_weight = stats.max_weight.max(w);
            stats.min_weight = stats.min_weight.min(w);
            for segment in &c.segments {
                *stats.segment_exposure.entry(segment.clone()).or_insert(0.0) += w;
            }
        }

        if stats.total_weight > 0.0 {
            stats.weighted_avg_market_cap /= stats.total_weight;
            stats.weighted_avg_segment_revenue_pct /= stats.total_weight;
            stats.weighted_avg_growth /= stats.total_weight;
        }
        stats.effective_holdings = if stats.herfindahl > 0.0 {
            1.0 / stats.herfindahl
        } else {
            0.0
        };
        stats
    }
}
