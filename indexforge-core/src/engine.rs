//! Rebalance engine — runs the pipeline for one (index, rebalance date).
//!
//! `Filtering → Normalizing → Scoring → Constraining → Finalized`
//!
//! Each stage is a pure function; the engine threads the outputs through,
//! tags any failure with the stage that raised it, and assembles the final
//! [`Composition`]. Nothing is retried. The same snapshot and config always
//! produce a bit-identical composition.

use std::cmp::Ordering;

use crate::config::IndexConfig;
use crate::constrain::{resolve_constraints, ConstraintOutcome};
use crate::domain::{
    ConfigHash, Composition, Constituent, Exclusion, ExclusionReason, FactorSnapshot, RunId,
    UniverseSnapshot, SCHEMA_VERSION,
};
use crate::error::{RebalanceError, Stage};
use crate::filter::{filter_universe, EligibleCompany};
use crate::normalize::{normalize_factors, FactorScores};
use crate::score::{composite_scores, preliminary_weights};
use crate::stats::SummaryStats;

/// Validated engine for one index configuration.
#[derive(Debug, Clone)]
pub struct RebalanceEngine {
    config: IndexConfig,
    config_hash: ConfigHash,
}

impl RebalanceEngine {
    /// Validate the configuration eagerly. Errors are reported against the
    /// first stage, since no computation can start.
    pub fn new(config: IndexConfig) -> Result<Self, RebalanceError> {
        config
            .validate()
            .map_err(|e| RebalanceError::config(Stage::Filtering, e))?;
        let config_hash = config.config_hash();
        Ok(Self {
            config,
            config_hash,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &ConfigHash {
        &self.config_hash
    }

    pub fn run(&self, snapshot: &UniverseSnapshot) -> Result<Composition, RebalanceError> {
        let cfg = &self.config;
        let _span = tracing::info_span!(
            "rebalance",
            index = %cfg.index.name,
            date = %cfg.index.rebalance_date
        )
        .entered();

        let filtered = filter_universe(
            snapshot,
            cfg.thresholds.as_ref(),
            cfg.index.rebalance_date,
        )?;
        tracing::info!(
            stage = %Stage::Filtering,
            candidates = snapshot.len(),
            eligible = filtered.eligible.len(),
            excluded = filtered.excluded.len(),
            "universe filtered"
        );
        let required = cfg.index.min_constituents;
        if filtered.eligible.len() < required {
            return Err(RebalanceError::InsufficientData {
                stage: Stage::Filtering,
                eligible: filtered.eligible.len(),
                required,
                excluded: filtered.excluded,
            });
        }
        let eligible = filtered.eligible;
        let mut excluded = filtered.excluded;

        let scores = normalize_factors(&eligible, &cfg.growth);
        tracing::debug!(stage = %Stage::Normalizing, "factors normalized");

        let raw = composite_scores(&scores, &cfg.factor_weights);
        let preliminary = preliminary_weights(&raw)?;
        tracing::debug!(stage = %Stage::Scoring, "preliminary weights assigned");

        let labels: Vec<String> = eligible.iter().map(|c| c.ticker.clone()).collect();
        let outcome = resolve_constraints(&preliminary, &labels, &cfg.positions, &cfg.solver)?;
        tracing::info!(
            stage = %Stage::Constraining,
            iterations = outcome.report.iterations,
            final_delta = outcome.report.final_delta,
            dropped = outcome.dropped.len(),
            "constraints resolved"
        );

        excluded.extend(outcome.dropped.iter().map(|&(i, w)| Exclusion {
            ticker: eligible[i].ticker.clone(),
            reason: ExclusionReason::BelowMinPositionSize {
                preliminary_weight: w,
                floor: cfg.positions.min,
            },
        }));
        if outcome.kept.len() < required {
            return Err(RebalanceError::InsufficientData {
                stage: Stage::Constraining,
                eligible: outcome.kept.len(),
                required,
                excluded,
            });
        }

        let mut constituents = build_constituents(
            &eligible,
            &scores,
            &raw,
            &preliminary,
            &outcome,
            cfg,
        );
        rank(&mut constituents);

        let universe_hash = snapshot.content_hash();
        let composition = Composition {
            schema_version: SCHEMA_VERSION,
            index_name: cfg.index.name.clone(),
            rebalance_date: cfg.index.rebalance_date,
            stats: SummaryStats::compute(&constituents),
            constituents,
            excluded,
            solver: outcome.report,
            run_id: RunId::derive(&self.config_hash, &universe_hash),
            config_hash: self.config_hash.clone(),
            universe_hash,
        };
        tracing::info!(
            stage = %Stage::Finalized,
            constituents = composition.len(),
            run_id = composition.run_id.short(),
            "composition finalized"
        );
        Ok(composition)
    }
}

fn build_constituents(
    eligible: &[EligibleCompany],
    scores: &FactorScores,
    raw: &[f64],
    preliminary: &[f64],
    outcome: &ConstraintOutcome,
    cfg: &IndexConfig,
) -> Vec<Constituent> {
    outcome
        .kept
        .iter()
        .enumerate()
        .map(|(k, &i)| {
            let company = &eligible[i];
            let factors = FactorSnapshot {
                segment_revenue_pct: company.segment_revenue_pct,
                revenue_growth: company.growth(cfg.growth.measure),
                market_cap: company.market_cap,
                segment_score: scores.segment[i],
                cap_score: scores.cap[i],
                growth_score: scores.growth[i],
            };
            let mut row = Constituent {
                ticker: company.ticker.clone(),
                name: company.name.clone(),
                weight: outcome.weights[k],
                rank: 0,
                raw_score: raw[i],
                preliminary_weight: preliminary[i],
                factors,
                segments: company.segments.clone(),
                capped: outcome.capped[k],
                floored: outcome.floored[k],
                rationale: None,
            };
            row.rationale = Some(rationale(&row, cfg));
            row
        })
        .collect()
}

/// Human-readable reason for the weight, stored with the constituent.
fn rationale(c: &Constituent, cfg: &IndexConfig) -> String {
    let f = &c.factors;
    let mut text = format!(
        "score {:.1} (segment {:.1}, cap {:.1}, growth {:.1})",
        c.raw_score, f.segment_score, f.cap_score, f.growth_score
    );
    let strongest = [
        ("segment purity", f.segment_score),
        ("size", f.cap_score),
        ("growth", f.growth_score),
    ]
    .into_iter()
    .max_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((label, _)) = strongest {
        text.push_str(&format!("; led by {label}"));
    }
    if c.capped {
        text.push_str(&format!("; held at {:.1}% cap", cfg.positions.max * 100.0));
    }
    if c.floored {
        text.push_str(&format!("; raised to {:.1}% floor", cfg.positions.min * 100.0));
    }
    text
}

fn rank(constituents: &mut [Constituent]) {
    constituents.sort_by(rank_order);
    for (i, c) in constituents.iter_mut().enumerate() {
        c.rank = i + 1;
    }
}

/// Ranking order: descending weight, then descending segment revenue pct,
/// then ticker ascending.
pub fn rank_order(a: &Constituent, b: &Constituent) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| {
            b.factors
                .segment_revenue_pct
                .total_cmp(&a.factors.segment_revenue_pct)
        })
        .then_with(|| a.ticker.cmp(&b.ticker))
}
