//! IndexForge Core — thematic index construction engine.
//!
//! This crate turns a universe snapshot and an index configuration into a
//! weighted, ranked composition:
//! - Domain types (companies, fundamentals snapshots, compositions, ids)
//! - TOML index configuration with eager validation
//! - Universe filter with a recorded reason for every exclusion
//! - Cross-sectional factor normalization and composite scoring
//! - Position-bound resolution by fixed-point iteration
//! - The rebalance engine that threads the stages together

pub mod config;
pub mod constrain;
pub mod domain;
pub mod engine;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod score;
pub mod stats;
pub mod synthetic;

pub use config::{ConfigError, IndexConfig};
pub use engine::RebalanceEngine;
pub use error::{RebalanceError, RunStatus, Stage};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything handed across threads by the batch
    /// runner is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::UniverseSnapshot>();
        require_sync::<domain::UniverseSnapshot>();
        require_send::<domain::Composition>();
        require_sync::<domain::Composition>();
        require_send::<domain::Exclusion>();
        require_sync::<domain::Exclusion>();

        // Config and engine
        require_send::<config::IndexConfig>();
        require_sync::<config::IndexConfig>();
        require_send::<engine::RebalanceEngine>();
        require_sync::<engine::RebalanceEngine>();

        // Errors
        require_send::<error::RebalanceError>();
        require_sync::<error::RebalanceError>();
        require_send::<config::ConfigError>();
        require_sync::<config::ConfigError>();
    }

    /// One snapshot shared by concurrent runs stays untouched and every run
    /// sees the same result.
    #[test]
    fn shared_snapshot_runs_concurrently() {
        use std::sync::Arc;

        let date = chrono::NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let snapshot = Arc::new(synthetic::synthetic_universe(60, date, 5));
        let mut cfg = IndexConfig::preset("SPACEINFRA", date).unwrap();
        cfg.positions.max = 0.08;
        cfg.positions.min = 0.005;
        let engine = Arc::new(RebalanceEngine::new(cfg).unwrap());
        let before = snapshot.content_hash();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let snapshot = Arc::clone(&snapshot);
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || engine.run(&snapshot).unwrap())
            })
            .collect();
        let results: Vec<domain::Composition> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(snapshot.content_hash(), before);
    }
}
