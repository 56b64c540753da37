use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::{SolverConfig, SolverKind};
use crate::error::EngineError;
use crate::optimization::annealing::AnnealingSolver;
use crate::optimization::exhaustive::ExhaustiveSolver;
use crate::optimization::problem::OptimizationProblem;
use crate::types::SELECTION_THRESHOLD;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Decision values produced by a solver together with the hard selection
/// derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Ascending indices whose raw value exceeds the selection threshold.
    pub selected_indices: Vec<usize>,
    /// One value in [0, 1] per asset.
    pub raw_values: Vec<f64>,
    /// Objective of the hard selection.
    pub objective_value: f64,
    /// Name of the backend that produced the values.
    pub solver: String,
}

impl AllocationResult {
    /// Validate `raw_values` and threshold them at `threshold`.
    pub fn from_raw_values(
        problem: &OptimizationProblem,
        raw_values: Vec<f64>,
        threshold: f64,
        solver: &str,
    ) -> EngineResult<Self> {
        if raw_values.len() != problem.num_variables() {
            return Err(EngineError::OptimizationFailed {
                solver: solver.into(),
                reason: format!(
                    "Returned {} values for {} variables",
                    raw_values.len(),
                    problem.num_variables()
                ),
            });
        }
        if let Some(bad) = raw_values.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(EngineError::OptimizationFailed {
                solver: solver.into(),
                reason: format!("Decision value {bad} outside [0, 1]"),
            });
        }

        let selected_indices: Vec<usize> = raw_values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > threshold)
            .map(|(i, _)| i)
            .collect();
        let objective_value = problem.subset_objective(&selected_indices);

        Ok(AllocationResult {
            selected_indices,
            raw_values,
            objective_value,
            solver: solver.into(),
        })
    }

    /// Hard 0/1 allocation with ones at `selected`.
    pub fn from_selection(
        problem: &OptimizationProblem,
        selected: &[usize],
        solver: &str,
    ) -> EngineResult<Self> {
        let mut raw = vec![0.0; problem.num_variables()];
        for &i in selected {
            let slot = raw.get_mut(i).ok_or_else(|| EngineError::OptimizationFailed {
                solver: solver.into(),
                reason: format!("Selected index {} out of range", i),
            })?;
            *slot = 1.0;
        }
        Self::from_raw_values(problem, raw, SELECTION_THRESHOLD, solver)
    }

    /// Re-derive the hard selection with a different threshold.
    pub fn rethreshold(self, problem: &OptimizationProblem, threshold: f64) -> EngineResult<Self> {
        let solver = self.solver;
        Self::from_raw_values(problem, self.raw_values, threshold, &solver)
    }

    pub fn is_empty(&self) -> bool {
        self.selected_indices.is_empty()
    }
}

/// A discrete optimizer for [`OptimizationProblem`].
///
/// Exact backends return a global optimum satisfying the budget equality.
/// Heuristic backends may return a sub-optimal selection, and may miss the
/// budget; callers see the selection as produced, never a silently
/// corrected one.
pub trait DiscreteSolver {
    fn name(&self) -> &'static str;

    /// Whether `solve` is guaranteed to return a global optimum.
    fn is_exact(&self) -> bool;

    fn solve(&self, problem: &OptimizationProblem) -> EngineResult<AllocationResult>;
}

/// Work bounds for a single solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverLimits {
    pub max_evaluations: u64,
    pub timeout: Option<Duration>,
}

impl Default for SolverLimits {
    fn default() -> Self {
        SolverLimits {
            max_evaluations: 2_000_000,
            timeout: None,
        }
    }
}

impl From<&SolverConfig> for SolverLimits {
    fn from(config: &SolverConfig) -> Self {
        SolverLimits {
            max_evaluations: config.max_evaluations,
            timeout: config.timeout(),
        }
    }
}

/// Cooperative budget check: solvers call `tick` once per objective
/// evaluation and abort on the first error.
#[derive(Debug)]
pub struct Deadline {
    solver: &'static str,
    started: Instant,
    limits: SolverLimits,
    evaluations: u64,
}

impl Deadline {
    const CLOCK_CHECK_INTERVAL: u64 = 1024;

    pub fn start(solver: &'static str, limits: SolverLimits) -> Self {
        Deadline {
            solver,
            started: Instant::now(),
            limits,
            evaluations: 0,
        }
    }

    pub fn tick(&mut self) -> EngineResult<()> {
        self.evaluations += 1;
        if self.evaluations > self.limits.max_evaluations {
            return Err(EngineError::OptimizationFailed {
                solver: self.solver.into(),
                reason: format!(
                    "Evaluation cap of {} exceeded",
                    self.limits.max_evaluations
                ),
            });
        }
        if self.evaluations % Self::CLOCK_CHECK_INTERVAL == 0 {
            self.check_clock()?;
        }
        Ok(())
    }

    pub fn check_clock(&self) -> EngineResult<()> {
        if let Some(timeout) = self.limits.timeout {
            if self.started.elapsed() > timeout {
                return Err(EngineError::OptimizationFailed {
                    solver: self.solver.into(),
                    reason: format!("Timed out after {} ms", timeout.as_millis()),
                });
            }
        }
        Ok(())
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Number of `k`-subsets of `n` items, or `None` on overflow.
pub fn binomial(n: usize, k: usize) -> Option<u64> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k) as u64;
    let n = n as u64;
    let mut acc: u64 = 1;
    for i in 0..k {
        // acc * (n - i) is divisible by (i + 1) at every step.
        acc = acc.checked_mul(n - i)? / (i + 1);
    }
    Some(acc)
}

/// Construct the backend named by `config` for a problem of the given size.
///
/// `fallback_seed` seeds the annealing chain when the solver config does
/// not carry its own seed.
pub fn build_solver(
    config: &SolverConfig,
    num_assets: usize,
    budget: usize,
    fallback_seed: Option<u64>,
) -> Box<dyn DiscreteSolver + Send + Sync> {
    let limits = SolverLimits::from(config);
    let kind = match config.kind {
        SolverKind::Auto => match binomial(num_assets, budget) {
            Some(count) if count <= config.max_evaluations => SolverKind::Exhaustive,
            _ => SolverKind::Annealing,
        },
        explicit => explicit,
    };
    debug!(?kind, num_assets, budget, "Selected solver backend");

    match kind {
        SolverKind::Annealing => Box::new(AnnealingSolver::new(
            config.annealing.clone(),
            limits,
            config.annealing.seed.or(fallback_seed),
        )),
        _ => Box::new(ExhaustiveSolver::new(limits)),
    }
}
