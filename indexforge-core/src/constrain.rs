//! Constraint resolver — enforces position bounds and restores the 100% total.
//!
//! Capping a weight and renormalizing by the new sum lifts every other weight,
//! which can push a previously uncapped name over the cap. In fixed-point mode
//! the clamp → renormalize pass repeats until no weight moves by more than
//! `epsilon`. The loop has a hard iteration ceiling; hitting it is an error,
//! never a silently accepted result.
//!
//! Impossible bounds (`max × n < 1` or `min × n > 1`) are rejected in both
//! modes before any clamping.

use crate::config::{ConfigError, ConstraintMode, FloorPolicy, PositionBounds, SolverConfig};
use crate::domain::SolverReport;
use crate::error::{RebalanceError, Stage};

/// Result of constraint resolution over the preliminary weights.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintOutcome {
    /// Indices into the preliminary vector that survived, ascending.
    pub kept: Vec<usize>,
    /// Final weights, aligned with `kept`.
    pub weights: Vec<f64>,
    /// Aligned with `kept`: weight was held at the cap.
    pub capped: Vec<bool>,
    /// Aligned with `kept`: weight was raised to the floor.
    pub floored: Vec<bool>,
    /// Indices removed under [`FloorPolicy::Drop`], with their preliminary weight.
    pub dropped: Vec<(usize, f64)>,
    pub report: SolverReport,
}

/// One clamp-then-renormalize pass. Returns the new weights and, per name,
/// whether the cap or the floor was applied.
fn clamp_pass(weights: &[f64], bounds: &PositionBounds) -> (Vec<f64>, Vec<bool>, Vec<bool>) {
    let capped: Vec<bool> = weights.iter().map(|&w| w > bounds.max).collect();
    let floored: Vec<bool> = weights.iter().map(|&w| w < bounds.min).collect();
    let clamped: Vec<f64> = weights
        .iter()
        .map(|&w| w.clamp(bounds.min, bounds.max))
        .collect();
    (renormalize(&clamped), capped, floored)
}

/// Divide by the sum (accumulated in index order). A non-positive sum leaves
/// the weights untouched.
fn renormalize(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.iter().map(|w| w / total).collect()
    } else {
        weights.to_vec()
    }
}

fn max_abs_delta(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Resolve position bounds over preliminary weights (ticker order).
///
/// `labels` names each preliminary weight (tickers) for the non-convergence
/// diagnostic; it must be the same length as `preliminary`.
pub fn resolve_constraints(
    preliminary: &[f64],
    labels: &[String],
    bounds: &PositionBounds,
    solver: &SolverConfig,
) -> Result<ConstraintOutcome, RebalanceError> {
    let (kept, dropped): (Vec<usize>, Vec<usize>) = match bounds.floor_policy {
        FloorPolicy::Raise => ((0..preliminary.len()).collect(), Vec::new()),
        FloorPolicy::Drop => (0..preliminary.len()).partition(|&i| preliminary[i] >= bounds.min),
    };
    let dropped: Vec<(usize, f64)> = dropped.into_iter().map(|i| (i, preliminary[i])).collect();

    if kept.is_empty() {
        return Err(RebalanceError::config(
            Stage::Constraining,
            ConfigError::MinPositionTooLarge {
                min: bounds.min,
                count: preliminary.len(),
            },
        ));
    }

    bounds
        .check_feasible(kept.len())
        .map_err(|e| RebalanceError::config(Stage::Constraining, e))?;
    let start = renormalize(&kept.iter().map(|&i| preliminary[i]).collect::<Vec<_>>());

    match bounds.mode {
        ConstraintMode::SinglePass => {
            let (weights, capped, floored) = clamp_pass(&start, bounds);
            let final_delta = max_abs_delta(&start, &weights);
            Ok(ConstraintOutcome {
                kept,
                weights,
                capped,
                floored,
                dropped,
                report: SolverReport {
                    iterations: 1,
                    final_delta,
                    converged: final_delta <= solver.epsilon,
                },
            })
        }
        ConstraintMode::FixedPoint => {
            iterate_to_fixed_point(start, kept, dropped, labels, bounds, solver)
        }
    }
}

fn iterate_to_fixed_point(
    start: Vec<f64>,
    kept: Vec<usize>,
    dropped: Vec<(usize, f64)>,
    labels: &[String],
    bounds: &PositionBounds,
    solver: &SolverConfig,
) -> Result<ConstraintOutcome, RebalanceError> {
    let mut weights = start;
    let mut ever_capped = vec![false; weights.len()];
    let mut ever_floored = vec![false; weights.len()];
    let mut delta = f64::INFINITY;

    for iteration in 1..=solver.max_iterations {
        let (next, capped, floored) = clamp_pass(&weights, bounds);
        delta = max_abs_delta(&weights, &next);
        weights = next;
        for i in 0..weights.len() {
            ever_capped[i] |= capped[i];
            ever_floored[i] |= floored[i];
        }
        tracing::trace!(iteration, delta, "constraint pass");

        if delta <= solver.epsilon {
            // Report a bound as binding only if the name still sits on it.
            let tol = (solver.epsilon * 10.0).max(1e-12);
            let capped = weights
                .iter()
                .zip(&ever_capped)
                .map(|(&w, &c)| c && w >= bounds.max - tol)
                .collect();
            let floored = weights
                .iter()
                .zip(&ever_floored)
                .map(|(&w, &f)| f && w <= bounds.min + tol)
                .collect();
            return Ok(ConstraintOutcome {
                kept,
                weights,
                capped,
                floored,
                dropped,
                report: SolverReport {
                    iterations: iteration,
                    final_delta: delta,
                    converged: true,
                },
            });
        }
    }

    let diagnostic: Vec<(String, f64)> = kept
        .iter()
        .zip(&weights)
        .map(|(&i, &w)| (labels.get(i).cloned().unwrap_or_default(), w))
        .collect();
    tracing::warn!(
        iterations = solver.max_iterations,
        delta,
        weights = ?diagnostic,
        "constraint resolution did not converge"
    );
    Err(RebalanceError::NonConvergence {
        iterations: solver.max_iterations,
        max_delta: delta,
        weights: diagnostic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("T{i:02}")).collect()
    }

    fn bounds(min: f64, max: f64) -> PositionBounds {
        PositionBounds {
            max,
            min,
            ..Default::default()
        }
    }

    fn sum(w: &[f64]) -> f64 {
        w.iter().sum()
    }

    #[test]
    fn uncapped_weights_pass_through() {
        let prelim = vec![0.1; 10];
        let out =
            resolve_constraints(&prelim, &labels(10), &bounds(0.01, 0.15), &SolverConfig::default())
                .unwrap();
        assert!(out.weights.iter().all(|&w| (w - 0.1).abs() < 1e-12));
        assert_eq!(out.report.iterations, 1);
        assert!(out.capped.iter().all(|c| !c));
    }

    #[test]
    fn iterates_until_no_weight_exceeds_cap() {
        // One dominant name: a single pass would leave it above the cap.
        let mut prelim = vec![0.5];
        prelim.extend(vec![0.5 / 9.0; 9]);
        let out =
            resolve_constraints(&prelim, &labels(10), &bounds(0.01, 0.15), &SolverConfig::default())
                .unwrap();

        assert!((sum(&out.weights) - 1.0).abs() < 1e-9);
        assert!((out.weights[0] - 0.15).abs() < 1e-6);
        assert!(out.weights.iter().all(|&w| w <= 0.15 + 1e-6));
        assert!(out.capped[0]);
        assert!(!out.capped[1]);
        assert!(out.report.converged);
        assert!(out.report.iterations > 1);
        // The other nine share the remainder equally.
        assert!((out.weights[1] - 0.85 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn floor_raise_lifts_small_weights() {
        let mut prelim = vec![0.002, 0.003];
        prelim.extend(vec![0.995 / 8.0; 8]);
        let out =
            resolve_constraints(&prelim, &labels(10), &bounds(0.01, 0.2), &SolverConfig::default())
                .unwrap();
        assert!((sum(&out.weights) - 1.0).abs() < 1e-9);
        assert!((out.weights[0] - 0.01).abs() < 1e-6);
        assert!((out.weights[1] - 0.01).abs() < 1e-6);
        assert!(out.floored[0] && out.floored[1]);
        assert!(out.dropped.is_empty());
    }

    #[test]
    fn floor_drop_removes_small_weights() {
        let mut prelim = vec![0.002, 0.003];
        prelim.extend(vec![0.995 / 8.0; 8]);
        let mut b = bounds(0.01, 0.2);
        b.floor_policy = FloorPolicy::Drop;
        let out = resolve_constraints(&prelim, &labels(10), &b, &SolverConfig::default()).unwrap();
        assert_eq!(out.kept, (2..10).collect::<Vec<_>>());
        assert_eq!(out.dropped, vec![(0, 0.002), (1, 0.003)]);
        assert!((sum(&out.weights) - 1.0).abs() < 1e-9);
        assert!(out.weights.iter().all(|&w| (w - 0.125).abs() < 1e-9));
    }

    #[test]
    fn infeasible_cap_is_configuration_error() {
        let err = resolve_constraints(
            &[0.2; 5],
            &labels(5),
            &bounds(0.01, 0.15),
            &SolverConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RebalanceError::Configuration {
                stage: Stage::Constraining,
                source: ConfigError::MaxPositionTooSmall { count: 5, .. }
            }
        ));
    }

    #[test]
    fn single_company_below_full_weight_is_configuration_error() {
        let err =
            resolve_constraints(&[1.0], &labels(1), &bounds(0.01, 0.99), &SolverConfig::default())
                .unwrap_err();
        assert_eq!(err.stage(), Stage::Constraining);
        assert!(matches!(err, RebalanceError::Configuration { .. }));

        let ok =
            resolve_constraints(&[1.0], &labels(1), &bounds(0.01, 1.0), &SolverConfig::default())
                .unwrap();
        assert_eq!(ok.weights, vec![1.0]);
    }

    #[test]
    fn iteration_ceiling_reports_non_convergence() {
        let mut prelim = vec![0.5];
        prelim.extend(vec![0.5 / 9.0; 9]);
        let solver = SolverConfig {
            epsilon: 1e-12,
            max_iterations: 2,
        };
        let err = resolve_constraints(&prelim, &labels(10), &bounds(0.01, 0.15), &solver)
            .unwrap_err();
        match err {
            RebalanceError::NonConvergence {
                iterations,
                weights,
                max_delta,
            } => {
                assert_eq!(iterations, 2);
                assert_eq!(weights.len(), 10);
                assert_eq!(weights[0].0, "T00");
                assert!(max_delta > 1e-12);
            }
            other => panic!("expected NonConvergence, got {other:?}"),
        }
    }

    #[test]
    fn single_pass_clamps_once() {
        // IRDM-like leader over a 25% cap; one pass leaves it slightly above.
        let prelim = [0.2656, 0.2184, 0.2094, 0.1580, 0.1486];
        let mut b = bounds(0.01, 0.25);
        b.mode = ConstraintMode::SinglePass;
        let out = resolve_constraints(&prelim, &labels(5), &b, &SolverConfig::default()).unwrap();
        assert_eq!(out.report.iterations, 1);
        assert!((sum(&out.weights) - 1.0).abs() < 1e-12);
        let clamped_total = 0.25 + 0.2184 + 0.2094 + 0.1580 + 0.1486;
        assert!((out.weights[0] - 0.25 / clamped_total).abs() < 1e-12);
        assert!(out.weights[0] > 0.25);
        assert_eq!(out.capped, vec![true, false, false, false, false]);
        assert!(!out.report.converged);
    }

    #[test]
    fn single_pass_rejects_infeasible_cap() {
        let mut b = bounds(0.01, 0.15);
        b.mode = ConstraintMode::SinglePass;
        let err = resolve_constraints(&[1.0], &labels(1), &b, &SolverConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RebalanceError::Configuration {
                stage: Stage::Constraining,
                source: ConfigError::MaxPositionTooSmall { count: 1, .. }
            }
        ));

        let err = resolve_constraints(&[0.2; 5], &labels(5), &b, &SolverConfig::default())
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Constraining);
        assert!(matches!(err, RebalanceError::Configuration { .. }));
    }
}
