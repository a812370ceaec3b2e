//! Universe filter — reduces the candidate list to the eligible set.
//!
//! Every rejected candidate gets a recorded [`ExclusionReason`]; nothing is
//! dropped silently. The eligible set comes back sorted by ticker so all
//! later stages sum in ticker order.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};

use crate::config::{ConfigError, EligibilityThresholds, GrowthMeasure};
use crate::domain::{Exclusion, ExclusionReason, UniverseEntry, UniverseSnapshot};
use crate::error::{RebalanceError, Stage};

/// A company that passed the eligibility screen, with every field present.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibleCompany {
    pub ticker: String,
    pub name: String,
    pub segment_revenue_pct: f64,
    pub segments: BTreeSet<String>,
    pub market_cap: f64,
    pub dollar_volume: f64,
    pub revenue_growth_yoy: f64,
    pub revenue_growth_3y_cagr: f64,
}

impl EligibleCompany {
    pub fn growth(&self, measure: GrowthMeasure) -> f64 {
        match measure {
            GrowthMeasure::Yoy => self.revenue_growth_yoy,
            GrowthMeasure::Cagr3y => self.revenue_growth_3y_cagr,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Sorted by ticker.
    pub eligible: Vec<EligibleCompany>,
    /// In feed order.
    pub excluded: Vec<Exclusion>,
}

/// Apply the eligibility screen.
///
/// Fails only on an empty feed or a missing threshold configuration. Zero
/// eligible companies is a valid outcome.
pub fn filter_universe(
    snapshot: &UniverseSnapshot,
    thresholds: Option<&EligibilityThresholds>,
    rebalance_date: NaiveDate,
) -> Result<FilterOutcome, RebalanceError> {
    let thresholds = match thresholds {
        Some(t) if !t.is_empty() => t,
        _ => return Err(RebalanceError::config(Stage::Filtering, ConfigError::EmptyThresholds)),
    };
    if snapshot.is_empty() {
        return Err(RebalanceError::InsufficientData {
            stage: Stage::Filtering,
            eligible: 0,
            required: 1,
            excluded: Vec::new(),
        });
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut outcome = FilterOutcome::default();

    for entry in &snapshot.entries {
        let ticker = entry.company.ticker.as_str();
        let verdict = if seen.insert(ticker) {
            screen(entry, thresholds, rebalance_date)
        } else {
            Err(ExclusionReason::DuplicateTicker)
        };
        match verdict {
            Ok(company) => outcome.eligible.push(company),
            Err(reason) => outcome.excluded.push(Exclusion {
                ticker: ticker.to_string(),
                reason,
            }),
        }
    }

    outcome.eligible.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    Ok(outcome)
}

fn screen(
    entry: &UniverseEntry,
    thresholds: &EligibilityThresholds,
    rebalance_date: NaiveDate,
) -> Result<EligibleCompany, ExclusionReason> {
    let company = &entry.company;
    let Some(fundamentals) = entry.fundamentals.as_ref() else {
        return Err(ExclusionReason::InsufficientData {
            missing: vec!["fundamentals".into()],
        });
    };

    let mut missing: Vec<String> = fundamentals
        .missing_fields()
        .into_iter()
        .map(String::from)
        .collect();
    if !company.segment_revenue_pct.is_some_and(f64::is_finite) {
        missing.push("segment_revenue_pct".into());
    }
    // All six fields are present past this point.
    let (
        Some(segment_revenue_pct),
        Some(market_cap),
        Some(dollar_volume),
        Some(revenue_growth_yoy),
        Some(revenue_growth_3y_cagr),
        true,
    ) = (
        company.segment_revenue_pct,
        fundamentals.market_cap,
        fundamentals.dollar_volume(),
        fundamentals.revenue_growth_yoy,
        fundamentals.revenue_growth_3y_cagr,
        missing.is_empty(),
    )
    else {
        return Err(ExclusionReason::InsufficientData { missing });
    };

    if fundamentals.date > rebalance_date {
        return Err(ExclusionReason::FutureDatedFundamentals {
            snapshot_date: fundamentals.date,
        });
    }
    if market_cap <= 0.0 {
        return Err(ExclusionReason::NonPositiveMarketCap { market_cap });
    }
    if !(0.0..=100.0).contains(&segment_revenue_pct) {
        return Err(ExclusionReason::InvalidSegmentRevenuePct {
            value: segment_revenue_pct,
        });
    }

    if let Some(threshold) = thresholds.min_market_cap {
        if market_cap < threshold {
            return Err(ExclusionReason::BelowMinMarketCap {
                value: market_cap,
                threshold,
            });
        }
    }
    if let Some(threshold) = thresholds.min_dollar_volume {
        if dollar_volume < threshold {
            return Err(ExclusionReason::BelowMinDollarVolume {
                value: dollar_volume,
                threshold,
            });
        }
    }
    if let Some(threshold) = thresholds.min_segment_revenue_pct {
        if segment_revenue_pct < threshold {
            return Err(ExclusionReason::BelowMinSegmentRevenuePct {
                value: segment_revenue_pct,
                threshold,
            });
        }
    }

    Ok(EligibleCompany {
        ticker: company.ticker.clone(),
        name: company.name.clone(),
        segment_revenue_pct,
        segments: company.segments.clone(),
        market_cap,
        dollar_volume,
        revenue_growth_yoy,
        revenue_growth_3y_cagr,
    })
}
