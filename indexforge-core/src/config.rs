//! Serializable index configuration.
//!
//! One TOML document per index: factor weights, eligibility thresholds,
//! position bounds, growth clipping, and solver limits. `validate()` runs
//! eagerly before any computation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::domain::ConfigHash;

/// Errors in configuration loading or validation, including constraints that
/// only become impossible once the eligible count is known.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("index name must not be empty")]
    EmptyIndexName,
    #[error("index name '{0}' must not contain path separators or '..'")]
    InvalidIndexName(String),
    #[error("unknown preset '{0}' (valid: SPACEINFRA, AIINFRA)")]
    UnknownPreset(String),
    #[error("factor weight '{name}' must be finite and non-negative, got {value}")]
    InvalidFactorWeight { name: &'static str, value: f64 },
    #[error("factor weights are all zero")]
    ZeroFactorWeights,
    #[error("no eligibility thresholds configured")]
    EmptyThresholds,
    #[error("threshold '{name}' must be finite and non-negative, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
    #[error("position bounds invalid: min {min}, max {max} (need 0 <= min <= max <= 1 and max > 0)")]
    InvalidPositionBounds { min: f64, max: f64 },
    #[error("growth clip floor {floor} must be below ceiling {ceiling}")]
    InvalidGrowthClip { floor: f64, ceiling: f64 },
    #[error("solver epsilon must be positive and finite, got {0}")]
    InvalidEpsilon(f64),
    #[error("solver max_iterations must be at least 1")]
    ZeroMaxIterations,
    #[error("min_constituents must be at least 1")]
    ZeroMinConstituents,
    #[error("max position {max} x {count} constituents < 1.0; weights cannot sum to 100%")]
    MaxPositionTooSmall { max: f64, count: usize },
    #[error("min position {min} x {count} constituents > 1.0; weights cannot sum to 100%")]
    MinPositionTooLarge { min: f64, count: usize },
    #[error("sum of raw scores is {0}; factor weights or factor scores are all zero")]
    NonPositiveScoreSum(f64),
}

/// Complete configuration for one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub index: IndexSection,
    #[serde(default)]
    pub factor_weights: FactorWeights,
    /// `None` means no threshold configuration was supplied, which is an error.
    pub thresholds: Option<EligibilityThresholds>,
    #[serde(default)]
    pub positions: PositionBounds,
    #[serde(default)]
    pub growth: GrowthClip,
    #[serde(default)]
    pub solver: SolverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSection {
    pub name: String,
    pub rebalance_date: NaiveDate,
    /// Fewer eligible companies than this aborts the run with insufficient data.
    #[serde(default = "default_min_constituents")]
    pub min_constituents: usize,
}

fn default_min_constituents() -> usize {
    1
}

/// Factor weights (w_segment, w_cap, w_growth). Conventionally sum to 1.0;
/// renormalized by their own sum otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub segment: f64,
    pub market_cap: f64,
    pub growth: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            segment: 0.4,
            market_cap: 0.3,
            growth: 0.3,
        }
    }
}

impl FactorWeights {
    pub fn sum(&self) -> f64 {
        self.segment + self.market_cap + self.growth
    }

    /// Weights divided by their own sum. Caller must have validated `sum() > 0`.
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        Self {
            segment: self.segment / total,
            market_cap: self.market_cap / total,
            growth: self.growth / total,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("segment", self.segment),
            ("market_cap", self.market_cap),
            ("growth", self.growth),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidFactorWeight { name, value });
            }
        }
        if self.sum() <= 0.0 {
            return Err(ConfigError::ZeroFactorWeights);
        }
        Ok(())
    }
}

/// Eligibility screen. Each threshold is meet-or-exceed; unset thresholds
/// are not applied, but at least one must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EligibilityThresholds {
    pub min_market_cap: Option<f64>,
    /// Minimum average daily dollar volume (price × share volume).
    pub min_dollar_volume: Option<f64>,
    pub min_segment_revenue_pct: Option<f64>,
}

impl EligibilityThresholds {
    pub fn is_empty(&self) -> bool {
        self.min_market_cap.is_none()
            && self.min_dollar_volume.is_none()
            && self.min_segment_revenue_pct.is_none()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::EmptyThresholds);
        }
        for (name, value) in [
            ("min_market_cap", self.min_market_cap),
            ("min_dollar_volume", self.min_dollar_volume),
            ("min_segment_revenue_pct", self.min_segment_revenue_pct),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::InvalidThreshold { name, value });
                }
            }
        }
        Ok(())
    }
}

/// What happens to a company whose preliminary weight is under the floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorPolicy {
    /// Force-raise to the floor, then renormalize.
    #[default]
    Raise,
    /// Remove from the composition and record an exclusion.
    Drop,
}

/// How the cap/floor pass is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintMode {
    /// Clamp then renormalize until a fixed point is reached.
    #[default]
    FixedPoint,
    /// A single clamp-then-renormalize pass. Infeasible bounds are still
    /// rejected; weights may end up slightly outside the bounds.
    SinglePass,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionBounds {
    pub max: f64,
    pub min: f64,
    #[serde(default)]
    pub floor_policy: FloorPolicy,
    #[serde(default)]
    pub mode: ConstraintMode,
}

impl Default for PositionBounds {
    fn default() -> Self {
        Self {
            max: 0.15,
            min: 0.01,
            floor_policy: FloorPolicy::Raise,
            mode: ConstraintMode::FixedPoint,
        }
    }
}

impl PositionBounds {
    fn validate(&self) -> Result<(), ConfigError> {
        let ok = self.min.is_finite()
            && self.max.is_finite()
            && self.min >= 0.0
            && self.max > 0.0
            && self.min <= self.max
            && self.max <= 1.0;
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidPositionBounds {
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Whether `count` weights can satisfy both bounds and still sum to 1.
    pub fn check_feasible(&self, count: usize) -> Result<(), ConfigError> {
        let n = count as f64;
        if self.max * n < 1.0 {
            return Err(ConfigError::MaxPositionTooSmall {
                max: self.max,
                count,
            });
        }
        if self.min * n > 1.0 {
            return Err(ConfigError::MinPositionTooLarge {
                min: self.min,
                count,
            });
        }
        Ok(())
    }
}

/// Which growth figure feeds the growth factor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrowthMeasure {
    #[default]
    #[serde(rename = "yoy")]
    Yoy,
    #[serde(rename = "cagr_3y")]
    Cagr3y,
}

/// Growth clipping range in percent, applied before min–max scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthClip {
    pub floor: f64,
    pub ceiling: f64,
    #[serde(default)]
    pub measure: GrowthMeasure,
}

impl Default for GrowthClip {
    fn default() -> Self {
        Self {
            floor: -50.0,
            ceiling: 200.0,
            measure: GrowthMeasure::Yoy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Fixed point is reached when no weight moves more than this.
    pub epsilon: f64,
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-9,
            max_iterations: 1_000,
        }
    }
}

/// Index names become directory names in the composition store.
pub fn validate_index_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyIndexName);
    }
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(ConfigError::InvalidIndexName(name.to_string()));
    }
    Ok(())
}

impl IndexConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string. Does not validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Built-in index definitions.
    pub fn preset(name: &str, rebalance_date: NaiveDate) -> Result<Self, ConfigError> {
        let thresholds = match name.to_ascii_uppercase().as_str() {
            "SPACEINFRA" => EligibilityThresholds {
                min_market_cap: Some(100e6),
                min_dollar_volume: Some(1e6),
                min_segment_revenue_pct: Some(20.0),
            },
            "AIINFRA" => EligibilityThresholds {
                min_market_cap: Some(500e6),
                min_dollar_volume: Some(5e6),
                min_segment_revenue_pct: Some(25.0),
            },
            _ => return Err(ConfigError::UnknownPreset(name.to_string())),
        };
        Ok(Self {
            index: IndexSection {
                name: name.to_ascii_uppercase(),
                rebalance_date,
                min_constituents: 5,
            },
            factor_weights: FactorWeights::default(),
            thresholds: Some(thresholds),
            positions: PositionBounds::default(),
            growth: GrowthClip::default(),
            solver: SolverConfig::default(),
        })
    }

    /// Validate everything that does not depend on the universe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_index_name(&self.index.name)?;
        if self.index.min_constituents == 0 {
            return Err(ConfigError::ZeroMinConstituents);
        }
        self.factor_weights.validate()?;
        self.thresholds
            .as_ref()
            .ok_or(ConfigError::EmptyThresholds)?
            .validate()?;
        self.positions.validate()?;
        if !(self.growth.floor < self.growth.ceiling) {
            return Err(ConfigError::InvalidGrowthClip {
                floor: self.growth.floor,
                ceiling: self.growth.ceiling,
            });
        }
        if !self.solver.epsilon.is_finite() || self.solver.epsilon <= 0.0 {
            return Err(ConfigError::InvalidEpsilon(self.solver.epsilon));
        }
        if self.solver.max_iterations == 0 {
            return Err(ConfigError::ZeroMaxIterations);
        }
        Ok(())
    }

    /// Deterministic hash over every field (canonical JSON through BLAKE3).
    pub fn config_hash(&self) -> ConfigHash {
        let json = serde_json::to_vec(self).unwrap_or_default();
        ConfigHash::from_bytes(&json)
    }
}
