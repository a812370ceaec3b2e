//! Index composition — the immutable output of one rebalance run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::ids::{ConfigHash, RunId, UniverseHash};
use crate::stats::SummaryStats;

/// Current schema version for persisted compositions.
pub const SCHEMA_VERSION: u32 = 1;

/// Why a candidate did not make it into the composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// A required fundamentals or classification field was absent.
    InsufficientData { missing: Vec<String> },
    /// Ticker already seen earlier in the same feed.
    DuplicateTicker,
    /// Fundamentals dated after the rebalance date.
    FutureDatedFundamentals { snapshot_date: NaiveDate },
    NonPositiveMarketCap { market_cap: f64 },
    InvalidSegmentRevenuePct { value: f64 },
    BelowMinMarketCap { value: f64, threshold: f64 },
    BelowMinDollarVolume { value: f64, threshold: f64 },
    BelowMinSegmentRevenuePct { value: f64, threshold: f64 },
    /// Preliminary weight under the position floor with the `drop` policy.
    BelowMinPositionSize { preliminary_weight: f64, floor: f64 },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData { missing } => {
                write!(f, "insufficient data (missing: {})", missing.join(", "))
            }
            Self::DuplicateTicker => write!(f, "duplicate ticker in universe feed"),
            Self::FutureDatedFundamentals { snapshot_date } => {
                write!(f, "fundamentals dated {snapshot_date} are after the rebalance date")
            }
            Self::NonPositiveMarketCap { market_cap } => {
                write!(f, "non-positive market cap {market_cap}")
            }
            Self::InvalidSegmentRevenuePct { value } => {
                write!(f, "segment revenue pct {value} outside 0-100")
            }
            Self::BelowMinMarketCap { value, threshold } => {
                write!(f, "market cap {value:.0} below minimum {threshold:.0}")
            }
            Self::BelowMinDollarVolume { value, threshold } => {
                write!(f, "dollar volume {value:.0} below minimum {threshold:.0}")
            }
            Self::BelowMinSegmentRevenuePct { value, threshold } => {
                write!(f, "segment revenue {value:.1}% below minimum {threshold:.1}%")
            }
            Self::BelowMinPositionSize {
                preliminary_weight,
                floor,
            } => write!(
                f,
                "preliminary weight {:.3}% below position floor {:.3}%",
                preliminary_weight * 100.0,
                floor * 100.0
            ),
        }
    }
}

/// An excluded candidate, kept for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub ticker: String,
    pub reason: ExclusionReason,
}

/// Factor inputs and scores as they were at computation time. Stored for
/// audit; never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSnapshot {
    pub segment_revenue_pct: f64,
    /// Growth rate actually used (YoY or 3y CAGR per config), before clipping.
    pub revenue_growth: f64,
    pub market_cap: f64,
    pub segment_score: f64,
    pub cap_score: f64,
    pub growth_score: f64,
}

/// One row of an index composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    pub ticker: String,
    pub name: String,
    pub weight: f64,
    /// 1 = largest weight.
    pub rank: usize,
    pub raw_score: f64,
    pub preliminary_weight: f64,
    pub factors: FactorSnapshot,
    pub segments: BTreeSet<String>,
    /// Weight was held at the position cap.
    pub capped: bool,
    /// Weight was raised to the position floor.
    pub floored: bool,
    pub rationale: Option<String>,
}

/// Diagnostics from the constraint resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    pub iterations: usize,
    /// Largest absolute weight change in the final pass.
    pub final_delta: f64,
    pub converged: bool,
}

/// A complete, immutable index composition for one rebalance date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub index_name: String,
    pub rebalance_date: NaiveDate,
    /// Ordered by rank.
    pub constituents: Vec<Constituent>,
    pub excluded: Vec<Exclusion>,
    pub stats: SummaryStats,
    pub solver: SolverReport,
    pub run_id: RunId,
    pub config_hash: ConfigHash,
    pub universe_hash: UniverseHash,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Composition {
    pub fn len(&self) -> usize {
        self.constituents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constituents.is_empty()
    }

    pub fn weight_of(&self, ticker: &str) -> Option<f64> {
        self.constituents
            .iter()
            .find(|c| c.ticker == ticker)
            .map(|c| c.weight)
    }

    /// Sum of weights, accumulated in ticker order.
    pub fn total_weight(&self) -> f64 {
        let mut rows: Vec<&Constituent> = self.constituents.iter().collect();
        rows.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        rows.iter().map(|c| c.weight).sum()
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.constituents.iter().map(|c| c.ticker.as_str()).collect()
    }
}
