//! Batch rebalance runs across independent (index, date) jobs.
//!
//! Each job owns its config and shares an immutable snapshot. Jobs never
//! see each other's state; one failing job yields an `Err` outcome and the
//! rest still run.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

use indexforge_core::domain::{Composition, UniverseSnapshot};
use indexforge_core::{IndexConfig, RebalanceEngine, RebalanceError, RunStatus};

use crate::store::{CompositionStore, StoreError};

/// One rebalance to run.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub config: IndexConfig,
    pub snapshot: Arc<UniverseSnapshot>,
}

impl BatchJob {
    pub fn new(config: IndexConfig, snapshot: Arc<UniverseSnapshot>) -> Self {
        Self { config, snapshot }
    }

    fn run(&self) -> BatchOutcome {
        let result = RebalanceEngine::new(self.config.clone())
            .and_then(|engine| engine.run(&self.snapshot));
        if let Err(e) = &result {
            tracing::warn!(
                index = %self.config.index.name,
                date = %self.config.index.rebalance_date,
                stage = %e.stage(),
                error = %e,
                "batch job failed"
            );
        }
        BatchOutcome {
            index_name: self.config.index.name.clone(),
            rebalance_date: self.config.index.rebalance_date,
            result,
        }
    }
}

/// Result of one job, tagged with what it was for.
#[derive(Debug)]
pub struct BatchOutcome {
    pub index_name: String,
    pub rebalance_date: NaiveDate,
    pub result: Result<Composition, RebalanceError>,
}

impl BatchOutcome {
    pub fn status(&self) -> RunStatus {
        match &self.result {
            Ok(_) => RunStatus::Success,
            Err(e) => e.status(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run every job. Outcomes come back in job order regardless of `parallel`.
pub fn run_batch(jobs: &[BatchJob], parallel: bool) -> Vec<BatchOutcome> {
    let _span = tracing::info_span!("batch", jobs = jobs.len(), parallel).entered();

    let outcomes: Vec<BatchOutcome> = if parallel {
        jobs.par_iter().map(BatchJob::run).collect()
    } else {
        jobs.iter().map(BatchJob::run).collect()
    };

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    tracing::info!(succeeded = outcomes.len() - failed, failed, "batch complete");
    outcomes
}

/// Store every successful outcome, aligned with `outcomes`. Failed runs map
/// to `None`. A save that fails is reported for its own job only and the
/// remaining compositions are still written.
pub fn save_outcomes(
    outcomes: &[BatchOutcome],
    store: &CompositionStore,
) -> Vec<Option<Result<PathBuf, StoreError>>> {
    outcomes
        .iter()
        .map(|outcome| {
            let composition = outcome.result.as_ref().ok()?;
            let saved = store.save(composition);
            if let Err(e) = &saved {
                tracing::warn!(
                    index = %outcome.index_name,
                    date = %outcome.rebalance_date,
                    error = %e,
                    "failed to store composition"
                );
            }
            Some(saved)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexforge_core::synthetic::synthetic_universe;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[test]
    fn empty_batch_is_empty() {
        assert!(run_batch(&[], true).is_empty());
    }

    #[test]
    fn invalid_config_fails_only_its_own_job() {
        let snapshot = Arc::new(synthetic_universe(60, date(), 5));
        let mut good = IndexConfig::preset("SPACEINFRA", date()).unwrap();
        good.positions.max = 0.08;
        good.positions.min = 0.005;
        let mut bad = good.clone();
        bad.index.name = "BROKEN".into();
        bad.solver.max_iterations = 0;

        let jobs = vec![
            BatchJob::new(good.clone(), Arc::clone(&snapshot)),
            BatchJob::new(bad, Arc::clone(&snapshot)),
            BatchJob::new(good, snapshot),
        ];
        let outcomes = run_batch(&jobs, true);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status(), RunStatus::Success);
        assert_eq!(outcomes[1].index_name, "BROKEN");
        assert_eq!(outcomes[1].status(), RunStatus::ConfigurationError);
        assert_eq!(outcomes[2].status(), RunStatus::Success);
    }
}
