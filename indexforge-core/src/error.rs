//! Rebalance run errors, tagged with the stage that raised them.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::Exclusion;

/// Pipeline stages of one rebalance run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Filtering,
    Normalizing,
    Scoring,
    Constraining,
    Finalized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Filtering => "filtering",
            Self::Normalizing => "normalizing",
            Self::Scoring => "scoring",
            Self::Constraining => "constraining",
            Self::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Outcome status of a run, for callers that only need the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    InsufficientData,
    ConfigurationError,
    NonConvergence,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::InsufficientData => "insufficient data",
            Self::ConfigurationError => "configuration error",
            Self::NonConvergence => "non-convergence",
        };
        f.write_str(name)
    }
}

/// Fatal errors of a single rebalance run. Never retried by the engine.
#[derive(Debug, Error)]
pub enum RebalanceError {
    #[error("configuration error during {stage}: {source}")]
    Configuration {
        stage: Stage,
        #[source]
        source: ConfigError,
    },
    #[error(
        "insufficient data during {stage}: {eligible} eligible, {required} required ({} excluded)",
        .excluded.len()
    )]
    InsufficientData {
        stage: Stage,
        eligible: usize,
        required: usize,
        excluded: Vec<Exclusion>,
    },
    #[error("constraint resolution did not converge after {iterations} iterations (last delta {max_delta:e})")]
    NonConvergence {
        iterations: usize,
        max_delta: f64,
        /// Final non-converged weights by ticker, for diagnosis.
        weights: Vec<(String, f64)>,
    },
}

impl RebalanceError {
    pub fn config(stage: Stage, source: ConfigError) -> Self {
        Self::Configuration { stage, source }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Configuration { stage, .. } | Self::InsufficientData { stage, .. } => *stage,
            Self::NonConvergence { .. } => Stage::Constraining,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            Self::Configuration { .. } => RunStatus::ConfigurationError,
            Self::InsufficientData { .. } => RunStatus::InsufficientData,
            Self::NonConvergence { .. } => RunStatus::NonConvergence,
        }
    }

    /// Excluded candidates, when the error carries them.
    pub fn excluded(&self) -> &[Exclusion] {
        match self {
            Self::InsufficientData { excluded, .. } => excluded,
            _ => &[],
        }
    }
}
