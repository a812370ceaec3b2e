//! Rebalance diff — what changed between two compositions of the same index.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use indexforge_core::domain::Composition;

/// A name whose weight moved between the two rebalances. Additions have
/// `previous = 0.0`, removals `next = 0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightChange {
    pub ticker: String,
    pub previous: f64,
    pub next: f64,
}

impl WeightChange {
    pub fn delta(&self) -> f64 {
        self.next - self.previous
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceDiff {
    pub index_name: String,
    pub previous_date: NaiveDate,
    pub next_date: NaiveDate,
    pub additions: Vec<WeightChange>,
    pub removals: Vec<WeightChange>,
    /// Names held in both, sorted by ticker. Includes unchanged weights.
    pub changes: Vec<WeightChange>,
    /// One-way turnover: ½ Σ |Δw| over the union of names.
    pub turnover: f64,
}

impl RebalanceDiff {
    pub fn between(previous: &Composition, next: &Composition) -> Self {
        let prev: BTreeMap<&str, f64> = previous
            .constituents
            .iter()
            .map(|c| (c.ticker.as_str(), c.weight))
            .collect();
        let curr: BTreeMap<&str, f64> = next
            .constituents
            .iter()
            .map(|c| (c.ticker.as_str(), c.weight))
            .collect();

        let mut additions = Vec::new();
        let mut removals = Vec::new();
        let mut changes = Vec::new();

        for (&ticker, &w) in &curr {
            let change = WeightChange {
                ticker: ticker.to_string(),
                previous: prev.get(ticker).copied().unwrap_or(0.0),
                next: w,
            };
            if prev.contains_key(ticker) {
                changes.push(change);
            } else {
                additions.push(change);
            }
        }
        for (&ticker, &w) in &prev {
            if !curr.contains_key(ticker) {
                removals.push(WeightChange {
                    ticker: ticker.to_string(),
                    previous: w,
                    next: 0.0,
                });
            }
        }

        // Accumulate over the union in ticker order.
        let mut all: Vec<&WeightChange> = additions.iter().chain(&changes).chain(&removals).collect();
        all.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        let turnover = 0.5 * all.iter().map(|c| c.delta().abs()).sum::<f64>();

        Self {
            index_name: next.index_name.clone(),
            previous_date: previous.rebalance_date,
            next_date: next.rebalance_date,
            additions,
            removals,
            changes,
            turnover,
        }
    }

    /// Held names whose weight moved by more than `threshold`, largest first.
    pub fn significant_changes(&self, threshold: f64) -> Vec<&WeightChange> {
        let mut moved: Vec<&WeightChange> = self
            .changes
            .iter()
            .filter(|c| c.delta().abs() > threshold)
            .collect();
        moved.sort_by(|a, b| {
            b.delta()
                .abs()
                .total_cmp(&a.delta().abs())
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        moved
    }
}
