//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for compositions:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: constituent table and exclusion log for spreadsheets
//! - **Markdown**: human-readable composition, diff and backtest reports
//!
//! All persisted artifacts include a `schema_version` field. Newer versions
//! are rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};
use indexforge_core::domain::{Composition, Exclusion, SCHEMA_VERSION};

use crate::backtest::BacktestReport;
use crate::diff::RebalanceDiff;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(composition: &Composition) -> Result<String> {
    serde_json::to_string_pretty(composition).context("failed to serialize composition to JSON")
}

/// Deserialize a composition, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<Composition> {
    let composition: Composition =
        serde_json::from_str(json).context("failed to deserialize composition from JSON")?;
    if composition.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            composition.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(composition)
}

pub fn load_json(path: &Path) -> Result<Composition> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Constituent table, one row per holding in rank order.
///
/// Columns: rank, ticker, name, weight, raw_score, preliminary_weight,
/// segment_revenue_pct, market_cap, revenue_growth, segment_score,
/// cap_score, growth_score, capped, floored, segments
pub fn export_constituents_csv(composition: &Composition) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "ticker",
        "name",
        "weight",
        "raw_score",
        "preliminary_weight",
        "segment_revenue_pct",
        "market_cap",
        "revenue_growth",
        "segment_score",
        "cap_score",
        "growth_score",
        "capped",
        "floored",
        "segments",
    ])?;

    for c in &composition.constituents {
        let f = &c.factors;
        let segments: Vec<&str> = c.segments.iter().map(String::as_str).collect();
        wtr.write_record([
            &c.rank.to_string(),
            &c.ticker,
            &c.name,
            &format!("{:.8}", c.weight),
            &format!("{:.4}", c.raw_score),
            &format!("{:.8}", c.preliminary_weight),
            &format!("{:.2}", f.segment_revenue_pct),
            &format!("{:.0}", f.market_cap),
            &format!("{:.2}", f.revenue_growth),
            &format!("{:.4}", f.segment_score),
            &format!("{:.4}", f.cap_score),
            &format!("{:.4}", f.growth_score),
            &c.capped.to_string(),
            &c.floored.to_string(),
            &segments.join(";"),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Exclusion log: ticker and human-readable reason.
pub fn export_exclusions_csv(excluded: &[Exclusion]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ticker", "reason"])?;
    for e in excluded {
        wtr.write_record([e.ticker.as_str(), &e.reason.to_string()])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write `{stem}.csv` and `{stem}_excluded.csv` next to each other.
pub fn save_csv(composition: &Composition, path: &Path) -> Result<()> {
    std::fs::write(path, export_constituents_csv(composition)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("composition");
    let excluded_path = path.with_file_name(format!("{stem}_excluded.csv"));
    std::fs::write(&excluded_path, export_exclusions_csv(&composition.excluded)?)
        .with_context(|| format!("failed to write {}", excluded_path.display()))?;
    Ok(())
}

// ─── Markdown reports ───────────────────────────────────────────────

fn pct(x: f64) -> String {
    format!("{:.2}%", x * 100.0)
}

/// Markdown report for one composition.
pub fn generate_report(composition: &Composition) -> String {
    let mut md = String::with_capacity(4096);
    let s = &composition.stats;

    md.push_str(&format!(
        "# {} Index — {}\n\n",
        composition.index_name, composition.rebalance_date
    ));

    md.push_str("## Summary\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Constituents | {} |\n", s.num_constituents));
    md.push_str(&format!("| Excluded | {} |\n", composition.excluded.len()));
    md.push_str(&format!("| Total Weight | {} |\n", pct(s.total_weight)));
    md.push_str(&format!("| Max / Min Weight | {} / {} |\n", pct(s.max_weight), pct(s.min_weight)));
    md.push_str(&format!(
        "| Effective Holdings | {:.1} (HHI {:.4}) |\n",
        s.effective_holdings, s.herfindahl
    ));
    md.push_str(&format!(
        "| Wtd. Avg Market Cap | ${:.2}B |\n",
        s.weighted_avg_market_cap / 1e9
    ));
    md.push_str(&format!(
        "| Wtd. Avg Segment Revenue | {:.1}% |\n",
        s.weighted_avg_segment_revenue_pct
    ));
    md.push_str(&format!("| Wtd. Avg Growth | {:.1}% |\n", s.weighted_avg_growth));
    md.push_str(&format!(
        "| Solver | {} iteration(s), final delta {:.2e} |\n",
        composition.solver.iterations, composition.solver.final_delta
    ));
    md.push_str(&format!("| Run ID | `{}` |\n\n", composition.run_id.short()));

    md.push_str("## Constituents\n\n");
    md.push_str("| # | Ticker | Name | Weight | Score | Segment % | Market Cap | Growth | Flags |\n");
    md.push_str("| ---: | --- | --- | ---: | ---: | ---: | ---: | ---: | --- |\n");
    for c in &composition.constituents {
        let mut flags = Vec::new();
        if c.capped {
            flags.push("cap");
        }
        if c.floored {
            flags.push("floor");
        }
        md.push_str(&format!(
            "| {} | {} | {} | {} | {:.1} | {:.1} | ${:.2}B | {:.1}% | {} |\n",
            c.rank,
            c.ticker,
            c.name,
            pct(c.weight),
            c.raw_score,
            c.factors.segment_revenue_pct,
            c.factors.market_cap / 1e9,
            c.factors.revenue_growth,
            flags.join(", ")
        ));
    }
    md.push('\n');

    if !s.segment_exposure.is_empty() {
        md.push_str("## Segment Exposure\n\n");
        md.push_str("| Segment | Weight |\n| --- | ---: |\n");
        for (segment, w) in &s.segment_exposure {
            md.push_str(&format!("| {segment} | {} |\n", pct(*w)));
        }
        md.push('\n');
    }

    if !composition.excluded.is_empty() {
        md.push_str("## Excluded\n\n");
        md.push_str("| Ticker | Reason |\n| --- | --- |\n");
        for e in &composition.excluded {
            md.push_str(&format!("| {} | {} |\n", e.ticker, e.reason));
        }
        md.push('\n');
    }

    md
}

/// Markdown summary of a rebalance diff.
pub fn generate_diff_report(diff: &RebalanceDiff) -> String {
    let mut md = String::with_capacity(1024);
    md.push_str(&format!(
        "# {} Rebalance: {} → {}\n\n",
        diff.index_name, diff.previous_date, diff.next_date
    ));
    md.push_str(&format!("One-way turnover: **{}**\n\n", pct(diff.turnover)));

    let sections = [
        ("Additions", &diff.additions),
        ("Removals", &diff.removals),
        ("Weight Changes", &diff.changes),
    ];
    for (title, rows) in sections {
        if rows.is_empty() {
            continue;
        }
        md.push_str(&format!("## {title}\n\n"));
        md.push_str("| Ticker | Previous | Next | Change |\n| --- | ---: | ---: | ---: |\n");
        for c in rows {
            md.push_str(&format!(
                "| {} | {} | {} | {:+.2}pp |\n",
                c.ticker,
                pct(c.previous),
                pct(c.next),
                c.delta() * 100.0
            ));
        }
        md.push('\n');
    }
    md
}

/// Markdown summary of a backtest.
pub fn generate_backtest_report(report: &BacktestReport) -> String {
    let mut md = String::with_capacity(2048);
    md.push_str(&format!("# {} Backtest\n\n", report.index_name));
    if let (Some(start), Some(end)) = (report.start_date(), report.end_date()) {
        md.push_str(&format!(
            "Composition of {}, held {} to {} ({} trading days).\n\n",
            report.rebalance_date, start, end, report.metrics.trading_days
        ));
    }

    let m = &report.metrics;
    md.push_str("| Metric | Index |");
    if let Some(b) = &report.benchmark {
        md.push_str(&format!(" {} |", b.ticker));
    }
    md.push('\n');
    md.push_str(if report.benchmark.is_some() {
        "| --- | ---: | ---: |\n"
    } else {
        "| --- | ---: |\n"
    });
    let bm = report.benchmark.as_ref().map(|b| &b.metrics);
    let rows: [(&str, f64, Option<f64>, bool); 7] = [
        ("Total Return", m.total_return, bm.map(|b| b.total_return), true),
        ("Annualized Return", m.annualized_return, bm.map(|b| b.annualized_return), true),
        ("Volatility (Ann.)", m.volatility, bm.map(|b| b.volatility), true),
        ("Sharpe Ratio", m.sharpe, bm.map(|b| b.sharpe), false),
        ("Max Drawdown", m.max_drawdown, bm.map(|b| b.max_drawdown), true),
        ("Best Day", m.best_day, bm.map(|b| b.best_day), true),
        ("Worst Day", m.worst_day, bm.map(|b| b.worst_day), true),
    ];
    for (label, index, bench, is_pct) in rows {
        let fmt = |x: f64| if is_pct { pct(x) } else { format!("{x:.2}") };
        md.push_str(&format!("| {label} | {} |", fmt(index)));
        if let Some(b) = bench {
            md.push_str(&format!(" {} |", fmt(b)));
        }
        md.push('\n');
    }
    md.push('\n');

    if let Some(b) = &report.benchmark {
        md.push_str(&format!(
            "Alpha vs {}: **{}**, Sharpe difference: **{:+.2}**\n\n",
            b.ticker,
            pct(b.alpha),
            b.sharpe_difference
        ));
    }

    md.push_str("## Constituents\n\n");
    md.push_str("| Ticker | Weight | Total Return | Volatility | Sharpe |\n");
    md.push_str("| --- | ---: | ---: | ---: | ---: |\n");
    for c in &report.constituents {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {:.2} |\n",
            c.ticker,
            pct(c.weight),
            pct(c.metrics.total_return),
            pct(c.metrics.volatility),
            c.metrics.sharpe
        ));
    }
    md
}
