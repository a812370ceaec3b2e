//! Load → calculate → store → diff → backtest, through files on disk.
//!
//! Tests:
//! 1. CSV universe loads and rebalances; the stored file reloads identically
//! 2. Diff between two quarterly rebalances
//! 3. Backtest index returns are the weighted constituent returns
//! 4. Benchmark alpha is index minus benchmark total return
//! 5. Markdown and CSV artifacts cover every constituent

use chrono::NaiveDate;
use std::path::Path;

use indexforge_core::config::IndexConfig;
use indexforge_core::domain::Composition;
use indexforge_core::RebalanceEngine;
use indexforge_runner::backtest::{simulate, BacktestError};
use indexforge_runner::diff::RebalanceDiff;
use indexforge_runner::export;
use indexforge_runner::loader::{load_prices_csv, load_universe};
use indexforge_runner::store::CompositionStore;

const HEADER: &str = "ticker,name,segment_revenue_pct,segments,date,revenue,revenue_growth_yoy,revenue_growth_3y_cagr,market_cap,price,volume\n";

fn q1() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
}

fn q2() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

fn write_universe(dir: &Path, name: &str, date: NaiveDate, rows: &[(&str, f64, f64, f64)]) -> std::path::PathBuf {
    let mut csv = HEADER.to_string();
    for (ticker, cap_b, seg, growth) in rows {
        csv.push_str(&format!(
            "{ticker},{ticker} Corp,{seg},Satellites;Launch,{date},5e8,{growth},{growth},{},25,2e6\n",
            cap_b * 1e9
        ));
    }
    let path = dir.join(name);
    std::fs::write(&path, csv).unwrap();
    path
}

fn calculate(universe_path: &Path, date: NaiveDate) -> Composition {
    let universe = load_universe(universe_path, date).unwrap();
    let mut cfg = IndexConfig::preset("SPACEINFRA", date).unwrap();
    cfg.positions.max = 0.25;
    RebalanceEngine::new(cfg).unwrap().run(&universe).unwrap()
}

fn quarters(dir: &Path) -> (Composition, Composition) {
    let first = write_universe(
        dir,
        "q1.csv",
        q1(),
        &[
            ("ASTS", 5.0, 100.0, 45.0),
            ("RKLB", 25.0, 80.0, 25.0),
            ("SPCE", 150.0, 20.0, 10.0),
            ("IRDM", 2.0, 95.0, 120.0),
            ("GSAT", 8.0, 60.0, 35.0),
        ],
    );
    let second = write_universe(
        dir,
        "q2.csv",
        q2(),
        &[
            ("ASTS", 9.0, 100.0, 60.0),
            ("RKLB", 28.0, 85.0, 30.0),
            ("IRDM", 2.5, 95.0, 90.0),
            ("GSAT", 7.0, 60.0, 20.0),
            ("PL", 3.0, 90.0, 30.0),
        ],
    );
    (calculate(&first, q1()), calculate(&second, q2()))
}

// ── 1. Calculate and store ──

#[test]
fn csv_universe_calculates_and_stores() {
    let tmp = tempfile::tempdir().unwrap();
    let (comp, _) = quarters(tmp.path());
    assert_eq!(comp.len(), 5);
    assert!((comp.total_weight() - 1.0).abs() < 1e-9);
    assert!(comp.constituents.iter().all(|c| c.weight <= 0.25 + 1e-9));
    assert_eq!(comp.constituents[0].ticker, "IRDM");

    let store = CompositionStore::new(tmp.path().join("store"));
    store.save(&comp).unwrap();
    assert_eq!(store.load("SPACEINFRA", q1()).unwrap(), comp);
}

// ── 2. Diff ──

#[test]
fn quarterly_diff() {
    let tmp = tempfile::tempdir().unwrap();
    let (prev, next) = quarters(tmp.path());
    let diff = RebalanceDiff::between(&prev, &next);

    assert_eq!(diff.previous_date, q1());
    assert_eq!(diff.next_date, q2());
    let added: Vec<&str> = diff.additions.iter().map(|c| c.ticker.as_str()).collect();
    let removed: Vec<&str> = diff.removals.iter().map(|c| c.ticker.as_str()).collect();
    assert_eq!(added, vec!["PL"]);
    assert_eq!(removed, vec!["SPCE"]);
    let held: Vec<&str> = diff.changes.iter().map(|c| c.ticker.as_str()).collect();
    assert_eq!(held, vec!["ASTS", "GSAT", "IRDM", "RKLB"]);

    let spce = prev.weight_of("SPCE").unwrap();
    let pl = next.weight_of("PL").unwrap();
    let held_moves: f64 = diff.changes.iter().map(|c| c.delta().abs()).sum();
    assert!((diff.turnover - 0.5 * (spce + pl + held_moves)).abs() < 1e-12);
    assert!(diff.turnover > 0.0 && diff.turnover <= 1.0);

    for c in diff.significant_changes(0.0) {
        assert!(c.delta().abs() > 0.0);
    }

    let md = export::generate_diff_report(&diff);
    assert!(md.contains("## Additions"));
    assert!(md.contains("| PL |"));
    assert!(md.contains("| SPCE |"));
}

#[test]
fn diff_against_itself_has_zero_turnover() {
    let tmp = tempfile::tempdir().unwrap();
    let (comp, _) = quarters(tmp.path());
    let diff = RebalanceDiff::between(&comp, &comp);
    assert!(diff.additions.is_empty() && diff.removals.is_empty());
    assert_eq!(diff.turnover, 0.0);
    assert!(diff.significant_changes(1e-12).is_empty());
}

// ── 3–4. Backtest ──

fn write_prices(dir: &Path) -> std::path::PathBuf {
    let mut csv = String::from("date,ticker,close\n");
    let days = ["2025-04-01", "2025-04-02", "2025-04-03"];
    for ticker in ["ASTS", "RKLB", "SPCE", "IRDM", "GSAT"] {
        let closes = if ticker == "ASTS" { [10.0, 11.0, 11.0] } else { [10.0, 10.0, 10.0] };
        for (day, close) in days.iter().zip(closes) {
            csv.push_str(&format!("{day},{ticker},{close}\n"));
        }
    }
    for (day, close) in days.iter().zip([400.0, 420.0, 420.0]) {
        csv.push_str(&format!("{day},SPY,{close}\n"));
    }
    let path = dir.join("prices.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

#[test]
fn backtest_uses_weighted_returns() {
    let tmp = tempfile::tempdir().unwrap();
    let (comp, _) = quarters(tmp.path());
    let prices = load_prices_csv(&write_prices(tmp.path())).unwrap();

    let report = simulate(&comp, &prices, 1000.0).unwrap();
    assert_eq!(report.points.len(), 3);
    assert_eq!(report.points[0].value, 1000.0);
    assert_eq!(report.points[0].daily_return, None);

    let asts = comp.weight_of("ASTS").unwrap();
    let r = report.points[1].daily_return.unwrap();
    assert!((r - 0.1 * asts).abs() < 1e-12);
    assert!((report.points[2].value - 1000.0 * (1.0 + 0.1 * asts)).abs() < 1e-9);
    assert!((report.metrics.total_return - 0.1 * asts).abs() < 1e-12);
    assert_eq!(report.metrics.max_drawdown, 0.0);
    assert_eq!(report.constituents.len(), 5);
}

#[test]
fn benchmark_alpha() {
    let tmp = tempfile::tempdir().unwrap();
    let (comp, _) = quarters(tmp.path());
    let prices = load_prices_csv(&write_prices(tmp.path())).unwrap();

    let report = simulate(&comp, &prices, 1000.0)
        .unwrap()
        .with_benchmark(&prices, "SPY")
        .unwrap();
    let bench = report.benchmark.as_ref().unwrap();
    assert!((bench.metrics.total_return - 0.05).abs() < 1e-12);
    assert!((bench.alpha - (report.metrics.total_return - 0.05)).abs() < 1e-12);

    let md = export::generate_backtest_report(&report);
    assert!(md.contains("Alpha vs SPY"));
}

#[test]
fn backtest_needs_prices_for_every_constituent() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, next) = quarters(tmp.path());
    let prices = load_prices_csv(&write_prices(tmp.path())).unwrap();
    // PL joined in Q2 and has no history.
    let err = simulate(&next, &prices, 1000.0).unwrap_err();
    assert!(matches!(err, BacktestError::MissingTicker(ref t) if t == "PL"));

    let (prev, _) = quarters(tmp.path());
    let err = simulate(&prev, &prices, 0.0).unwrap_err();
    assert!(matches!(err, BacktestError::InvalidBaseValue(_)));
}

// ── 5. Artifacts ──

#[test]
fn artifacts_cover_every_constituent() {
    let tmp = tempfile::tempdir().unwrap();
    let (comp, _) = quarters(tmp.path());

    let csv_path = tmp.path().join("q1_constituents.csv");
    export::save_csv(&comp, &csv_path).unwrap();
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 6);
    assert!(tmp.path().join("q1_constituents_excluded.csv").exists());

    let md = export::generate_report(&comp);
    for ticker in comp.tickers() {
        assert!(md.contains(&format!("| {ticker} |")));
    }

    let json = export::export_json(&comp).unwrap();
    assert_eq!(export::import_json(&json).unwrap(), comp);
}
