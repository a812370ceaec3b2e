//! Performance metrics — pure functions over a daily return series.
//!
//! Every metric is a pure function: returns in, scalar out. All values are
//! fractions (0.12 = 12%), annualized over 252 trading days.

use serde::{Deserialize, Serialize};

pub const TRADING_DAYS: f64 = 252.0;

/// Aggregate performance metrics for one return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    /// Deepest peak-to-trough decline, as a non-positive fraction.
    pub max_drawdown: f64,
    pub best_day: f64,
    pub worst_day: f64,
    pub trading_days: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from daily returns.
    pub fn compute(returns: &[f64]) -> Self {
        Self {
            total_return: total_return(returns),
            annualized_return: annualized_return(returns),
            volatility: annualized_volatility(returns),
            sharpe: sharpe_ratio(returns),
            max_drawdown: max_drawdown(returns),
            best_day: returns.iter().copied().reduce(f64::max).unwrap_or(0.0),
            worst_day: returns.iter().copied().reduce(f64::min).unwrap_or(0.0),
            trading_days: returns.len(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Compounded return over the series: Π(1 + r) − 1.
pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().map(|r| 1.0 + r).product::<f64>() - 1.0
}

/// (1 + total)^(252 / n) − 1. 0.0 for an empty series, −1.0 after a total loss.
pub fn annualized_return(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let growth = 1.0 + total_return(returns);
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(TRADING_DAYS / returns.len() as f64) - 1.0
}

/// Sample standard deviation of daily returns × √252.
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    std_dev(returns) * TRADING_DAYS.sqrt()
}

/// Annualized return over annualized volatility (zero risk-free rate).
///
/// Returns 0.0 when volatility is zero.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let vol = annualized_volatility(returns);
    if vol < 1e-15 {
        return 0.0;
    }
    annualized_return(returns) / vol
}

/// Maximum drawdown of the compounded curve, as a non-positive fraction.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut value = 1.0;
    let mut peak = 1.0;
    let mut worst: f64 = 0.0;
    for r in returns {
        value *= 1.0 + r;
        if value > peak {
            peak = value;
        }
        worst = worst.min((value - peak) / peak);
    }
    worst
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_return_compounds() {
        let r = total_return(&[0.10, -0.10]);
        assert!((r - (-0.01)).abs() < 1e-12);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn annualizes_over_252_days() {
        // 1% total over 126 days annualizes to (1.01)^2 - 1.
        let mut returns = vec![0.0; 126];
        returns[0] = 0.01;
        let a = annualized_return(&returns);
        assert!((a - 0.0201).abs() < 1e-12);
    }

    #[test]
    fn drawdown_from_peak() {
        // 1.0 -> 1.2 -> 0.9 -> 1.08
        let dd = max_drawdown(&[0.2, -0.25, 0.2]);
        assert!((dd - (-0.25)).abs() < 1e-12);
        assert_eq!(max_drawdown(&[0.01, 0.02]), 0.0);
    }

    #[test]
    fn constant_returns_have_zero_volatility_and_sharpe() {
        let returns = vec![0.001; 50];
        assert!(annualized_volatility(&returns) < 1e-12);
        assert_eq!(sharpe_ratio(&returns), 0.0);
    }

    #[test]
    fn best_and_worst_day() {
        let m = PerformanceMetrics::compute(&[0.03, -0.05, 0.01]);
        assert_eq!(m.best_day, 0.03);
        assert_eq!(m.worst_day, -0.05);
        assert_eq!(m.trading_days, 3);
    }
}
