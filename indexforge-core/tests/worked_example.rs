//! The five-company SPACEINFRA scenario, end to end.
//!
//! Market caps {5, 25, 150, 2, 8} $B, segment revenue {100, 80, 20, 95, 60}%,
//! YoY growth {45, 25, 10, 120, 35}%, factor weights (0.4, 0.3, 0.3),
//! position bounds [1%, 15%].
//!
//! Tests:
//! 1. Intermediate factor scores and raw scores
//! 2. Single-pass resolution rejects the 15% cap as infeasible for 5 names
//! 3. Fixed-point resolution rejects the same cap
//! 4. Fixed-point resolution with a 25% cap converges within bounds

use chrono::NaiveDate;
use indexforge_core::config::{ConfigError, ConstraintMode, IndexConfig};
use indexforge_core::domain::{Company, Composition, FundamentalsSnapshot, UniverseEntry, UniverseSnapshot};
use indexforge_core::{RebalanceEngine, RebalanceError, RunStatus, Stage};

// ── Helpers ──────────────────────────────────────────────────────────

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
}

fn universe() -> UniverseSnapshot {
    let rows = [
        ("ASTS", "AST SpaceMobile", 5.0, 100.0, 45.0),
        ("RKLB", "Rocket Lab", 25.0, 80.0, 25.0),
        ("SPCE", "Virgin Galactic", 150.0, 20.0, 10.0),
        ("IRDM", "Iridium", 2.0, 95.0, 120.0),
        ("GSAT", "Globalstar", 8.0, 60.0, 35.0),
    ];
    let entries = rows
        .iter()
        .map(|&(ticker, name, cap_b, seg, growth)| UniverseEntry {
            company: Company::new(ticker, name).with_segment_revenue_pct(seg),
            fundamentals: Some(FundamentalsSnapshot {
                date: date(),
                revenue: Some(500e6),
                revenue_growth_yoy: Some(growth),
                revenue_growth_3y_cagr: Some(growth),
                market_cap: Some(cap_b * 1e9),
                price: Some(25.0),
                volume: Some(2e6),
            }),
        })
        .collect();
    UniverseSnapshot::new(date(), entries)
}

fn config(max: f64, mode: ConstraintMode) -> IndexConfig {
    let mut cfg = IndexConfig::preset("SPACEINFRA", date()).unwrap();
    cfg.positions.max = max;
    cfg.positions.min = 0.01;
    cfg.positions.mode = mode;
    cfg
}

fn run(max: f64, mode: ConstraintMode) -> Result<Composition, RebalanceError> {
    RebalanceEngine::new(config(max, mode))?.run(&universe())
}

fn row<'a>(comp: &'a Composition, ticker: &str) -> &'a indexforge_core::domain::Constituent {
    comp.constituents
        .iter()
        .find(|c| c.ticker == ticker)
        .unwrap_or_else(|| panic!("{ticker} missing from composition"))
}

fn assert_close(actual: f64, expected: f64, tol: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{what}: expected {expected}, got {actual}"
    );
}

// ── 1. Intermediate scores ───────────────────────────────────────────

#[test]
fn factor_and_raw_scores_match_hand_computation() {
    let comp = run(0.25, ConstraintMode::FixedPoint).unwrap();
    let expected = [
        // ticker, cap score, growth score, raw score
        ("ASTS", 21.2, 31.8, 55.9),
        ("RKLB", 58.5, 13.6, 53.6),
        ("SPCE", 100.0, 0.0, 38.0),
        ("IRDM", 0.0, 100.0, 68.0),
        ("GSAT", 32.1, 22.7, 40.45),
    ];
    for (ticker, cap, growth, raw) in expected {
        let c = row(&comp, ticker);
        assert_close(c.factors.cap_score, cap, 0.05, &format!("{ticker} cap score"));
        assert_close(c.factors.growth_score, growth, 0.05, &format!("{ticker} growth score"));
        assert_close(c.raw_score, raw, 0.05, &format!("{ticker} raw score"));
    }
    assert_close(row(&comp, "IRDM").preliminary_weight, 0.2656, 1e-4, "IRDM preliminary");
    assert_close(row(&comp, "SPCE").preliminary_weight, 0.1484, 1e-4, "SPCE preliminary");
}

// ── 2. Single pass ───────────────────────────────────────────────────

#[test]
fn single_pass_rejects_cap_that_cannot_reach_full_weight() {
    let err = run(0.15, ConstraintMode::SinglePass).unwrap_err();
    assert_eq!(err.status(), RunStatus::ConfigurationError);
    assert_eq!(err.stage(), Stage::Constraining);
    assert!(matches!(
        err,
        RebalanceError::Configuration {
            source: ConfigError::MaxPositionTooSmall { count: 5, .. },
            ..
        }
    ));
}

#[test]
fn single_pass_with_feasible_cap_clamps_once() {
    let comp = run(0.25, ConstraintMode::SinglePass).unwrap();
    assert_close(comp.total_weight(), 1.0, 1e-6, "total weight");
    assert_eq!(comp.solver.iterations, 1);
    // IRDM is clamped to 25% and then lifted back over the cap by the
    // renormalization.
    let irdm = row(&comp, "IRDM");
    assert!(irdm.capped);
    assert!(irdm.weight > 0.25);
    let rest: f64 = ["ASTS", "RKLB", "SPCE", "GSAT"]
        .iter()
        .map(|t| row(&comp, t).preliminary_weight)
        .sum();
    assert_close(irdm.weight, 0.25 / (0.25 + rest), 1e-9, "IRDM");
    assert_eq!(comp.tickers(), vec!["IRDM", "ASTS", "RKLB", "GSAT", "SPCE"]);
}

// ── 3. Fixed point with an infeasible cap ────────────────────────────

#[test]
fn fixed_point_rejects_cap_that_cannot_reach_full_weight() {
    let err = run(0.15, ConstraintMode::FixedPoint).unwrap_err();
    assert_eq!(err.status(), RunStatus::ConfigurationError);
    assert_eq!(err.stage(), Stage::Constraining);
    assert!(matches!(
        err,
        RebalanceError::Configuration {
            source: ConfigError::MaxPositionTooSmall { count: 5, .. },
            ..
        }
    ));
}

// ── 4. Fixed point with a feasible cap ───────────────────────────────

#[test]
fn fixed_point_converges_inside_bounds() {
    let comp = run(0.25, ConstraintMode::FixedPoint).unwrap();
    assert_close(comp.total_weight(), 1.0, 1e-6, "total weight");
    assert!(comp.solver.converged);
    assert!(comp.solver.iterations > 1);

    let expected = [
        ("ASTS", 0.22305),
        ("RKLB", 0.21399),
        ("SPCE", 0.15159),
        ("IRDM", 0.25000),
        ("GSAT", 0.16137),
    ];
    for (ticker, weight) in expected {
        assert_close(row(&comp, ticker).weight, weight, 1e-5, ticker);
    }
    for c in &comp.constituents {
        assert!(c.weight <= 0.25 + 1e-6 && c.weight >= 0.01 - 1e-6);
    }
    assert!(row(&comp, "IRDM").capped);
    assert_eq!(comp.tickers(), vec!["IRDM", "ASTS", "RKLB", "GSAT", "SPCE"]);
}
