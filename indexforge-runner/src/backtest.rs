//! Historical simulation of a fixed composition.
//!
//! Weights are held constant over the window (no drift, no intra-window
//! rebalancing). Only dates on which every constituent has a close are
//! used; the index return on each such date is the weight-summed return of
//! its constituents since the previous usable date, accumulated in ticker
//! order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use indexforge_core::domain::{Composition, IndexPerformancePoint};

use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("no price history for constituent '{0}'")]
    MissingTicker(String),
    #[error("only {0} dates with prices for every constituent; need at least 2")]
    InsufficientHistory(usize),
    #[error("composition has no constituents")]
    EmptyComposition,
    #[error("base value must be positive, got {0}")]
    InvalidBaseValue(f64),
}

/// Daily closes per ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    series: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl PriceHistory {
    pub fn insert(&mut self, ticker: &str, date: NaiveDate, close: f64) {
        self.series
            .entry(ticker.to_string())
            .or_default()
            .insert(date, close);
    }

    pub fn close(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        self.series.get(ticker)?.get(&date).copied()
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.series.contains_key(ticker)
    }

    /// Dates on which every listed ticker has a close, ascending.
    pub fn common_dates(&self, tickers: &[&str]) -> Vec<NaiveDate> {
        let mut series = tickers.iter().filter_map(|t| self.series.get(*t));
        let Some(first) = series.next() else {
            return Vec::new();
        };
        let mut dates: BTreeSet<NaiveDate> = first.keys().copied().collect();
        for s in series {
            dates.retain(|d| s.contains_key(d));
        }
        dates.into_iter().collect()
    }

    /// Restrict every series to `[start, end]` (either bound optional).
    pub fn window(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let keep = |d: &NaiveDate| start.map_or(true, |s| *d >= s) && end.map_or(true, |e| *d <= e);
        let series = self
            .series
            .iter()
            .map(|(t, s)| {
                let s: BTreeMap<NaiveDate, f64> =
                    s.iter().filter(|(d, _)| keep(d)).map(|(d, c)| (*d, *c)).collect();
                (t.clone(), s)
            })
            .collect();
        Self { series }
    }

    /// Simple daily returns for one ticker over consecutive `dates`.
    fn returns(&self, ticker: &str, dates: &[NaiveDate]) -> Vec<f64> {
        dates
            .windows(2)
            .filter_map(|w| Some(self.close(ticker, w[1])? / self.close(ticker, w[0])? - 1.0))
            .collect()
    }
}

/// A constituent's own performance over the backtest window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentPerformance {
    pub ticker: String,
    pub weight: f64,
    pub metrics: PerformanceMetrics,
}

/// Index versus a benchmark over the same window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub ticker: String,
    pub metrics: PerformanceMetrics,
    /// Index total return minus benchmark total return.
    pub alpha: f64,
    pub sharpe_difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub index_name: String,
    pub rebalance_date: NaiveDate,
    pub base_value: f64,
    pub points: Vec<IndexPerformancePoint>,
    pub metrics: PerformanceMetrics,
    pub constituents: Vec<ConstituentPerformance>,
    pub benchmark: Option<BenchmarkComparison>,
}

impl BacktestReport {
    pub fn daily_returns(&self) -> Vec<f64> {
        self.points.iter().filter_map(|p| p.daily_return).collect()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Compare against `ticker` over this report's window. The benchmark
    /// uses its own trading dates inside the window.
    pub fn with_benchmark(mut self, prices: &PriceHistory, ticker: &str) -> Result<Self, BacktestError> {
        if !prices.contains(ticker) {
            return Err(BacktestError::MissingTicker(ticker.to_string()));
        }
        let window = prices.window(self.start_date(), self.end_date());
        let dates = window.common_dates(&[ticker]);
        if dates.len() < 2 {
            return Err(BacktestError::InsufficientHistory(dates.len()));
        }
        let metrics = PerformanceMetrics::compute(&window.returns(ticker, &dates));
        self.benchmark = Some(BenchmarkComparison {
            ticker: ticker.to_string(),
            alpha: self.metrics.total_return - metrics.total_return,
            sharpe_difference: self.metrics.sharpe - metrics.sharpe,
            metrics,
        });
        Ok(self)
    }
}

/// Simulate `composition` over `prices`, starting at `base_value`.
pub fn simulate(
    composition: &Composition,
    prices: &PriceHistory,
    base_value: f64,
) -> Result<BacktestReport, BacktestError> {
    if composition.is_empty() {
        return Err(BacktestError::EmptyComposition);
    }
    if !base_value.is_finite() || base_value <= 0.0 {
        return Err(BacktestError::InvalidBaseValue(base_value));
    }

    let mut holdings: Vec<(&str, f64)> = composition
        .constituents
        .iter()
        .map(|c| (c.ticker.as_str(), c.weight))
        .collect();
    holdings.sort_by(|a, b| a.0.cmp(b.0));
    if let Some((missing, _)) = holdings.iter().find(|(t, _)| !prices.contains(t)) {
        return Err(BacktestError::MissingTicker(missing.to_string()));
    }

    let tickers: Vec<&str> = holdings.iter().map(|(t, _)| *t).collect();
    let dates = prices.common_dates(&tickers);
    if dates.len() < 2 {
        return Err(BacktestError::InsufficientHistory(dates.len()));
    }

    let per_ticker: Vec<Vec<f64>> = tickers.iter().map(|t| prices.returns(t, &dates)).collect();
    let index_returns: Vec<f64> = (0..dates.len() - 1)
        .map(|day| {
            holdings
                .iter()
                .zip(&per_ticker)
                .map(|((_, w), r)| w * r[day])
                .sum::<f64>()
        })
        .collect();

    let mut value = base_value;
    let mut points = Vec::with_capacity(dates.len());
    points.push(IndexPerformancePoint {
        index_name: composition.index_name.clone(),
        date: dates[0],
        value,
        daily_return: None,
    });
    for (date, r) in dates[1..].iter().zip(&index_returns) {
        value *= 1.0 + r;
        points.push(IndexPerformancePoint {
            index_name: composition.index_name.clone(),
            date: *date,
            value,
            daily_return: Some(*r),
        });
    }

    let constituents = holdings
        .iter()
        .zip(&per_ticker)
        .map(|((ticker, weight), r)| ConstituentPerformance {
            ticker: ticker.to_string(),
            weight: *weight,
            metrics: PerformanceMetrics::compute(r),
        })
        .collect();

    tracing::info!(
        index = %composition.index_name,
        days = dates.len(),
        final_value = value,
        "backtest complete"
    );

    Ok(BacktestReport {
        index_name: composition.index_name.clone(),
        rebalance_date: composition.rebalance_date,
        base_value,
        points,
        metrics: PerformanceMetrics::compute(&index_returns),
        constituents,
        benchmark: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn prices() -> PriceHistory {
        let mut p = PriceHistory::default();
        for (day, a, b) in [(2, 10.0, 20.0), (3, 11.0, 20.0), (6, 11.0, 22.0), (7, 12.1, 22.0)] {
            p.insert("AAA", d(day), a);
            p.insert("BBB", d(day), b);
        }
        // BBB has no close on the 8th, so the 8th is skipped.
        p.insert("AAA", d(8), 20.0);
        p
    }

    #[test]
    fn common_dates_require_every_ticker() {
        let p = prices();
        assert_eq!(p.common_dates(&["AAA", "BBB"]), vec![d(2), d(3), d(6), d(7)]);
        assert_eq!(p.common_dates(&["AAA"]).len(), 5);
        assert!(p.common_dates(&[]).is_empty());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let p = prices().window(Some(d(3)), Some(d(6)));
        assert_eq!(p.common_dates(&["AAA", "BBB"]), vec![d(3), d(6)]);
    }

    #[test]
    fn returns_over_consecutive_usable_dates() {
        let p = prices();
        let r = p.returns("AAA", &[d(2), d(3), d(6)]);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert_eq!(r[1], 0.0);
    }
}
