//! IndexForge Runner — orchestration around the rebalance engine.
//!
//! This crate builds on `indexforge-core` to provide:
//! - Universe and price loading from CSV and JSON
//! - Batch rebalance runs across independent (index, date) jobs
//! - An immutable on-disk composition store
//! - JSON, CSV and Markdown export
//! - Rebalance diffs with one-way turnover
//! - Historical simulation of a composition with performance metrics

pub mod backtest;
pub mod batch;
pub mod diff;
pub mod export;
pub mod loader;
pub mod metrics;
pub mod store;

pub use backtest::{simulate, BacktestError, BacktestReport, BenchmarkComparison, PriceHistory};
pub use batch::{run_batch, save_outcomes, BatchJob, BatchOutcome};
pub use diff::{RebalanceDiff, WeightChange};
pub use loader::{load_prices_csv, load_universe, LoadError};
pub use metrics::PerformanceMetrics;
pub use store::{CompositionStore, StoreError, StoredEntry};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn batch_types_are_send_sync() {
        assert_send::<BatchJob>();
        assert_sync::<BatchJob>();
        assert_send::<BatchOutcome>();
        assert_sync::<BatchOutcome>();
    }

    #[test]
    fn price_history_is_send_sync() {
        assert_send::<PriceHistory>();
        assert_sync::<PriceHistory>();
    }

    #[test]
    fn reports_are_send_sync() {
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
        assert_send::<RebalanceDiff>();
        assert_sync::<RebalanceDiff>();
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    #[test]
    fn store_is_send_sync() {
        assert_send::<CompositionStore>();
        assert_sync::<CompositionStore>();
        assert_send::<StoreError>();
        assert_sync::<StoreError>();
    }
}
