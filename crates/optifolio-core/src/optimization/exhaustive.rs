use tracing::debug;

use crate::error::EngineError;
use crate::optimization::problem::OptimizationProblem;
use crate::optimization::solver::{binomial, AllocationResult, Deadline, DiscreteSolver, SolverLimits};
use crate::EngineResult;

/// Exact backend: evaluates every subset of exactly `budget` assets.
///
/// Subsets are visited in lexicographic order and only a strictly better
/// objective replaces the incumbent, so ties resolve to the
/// lexicographically smallest index set. Practical up to roughly 20-25
/// assets; larger problems are refused before any work is done.
#[derive(Debug, Clone, Default)]
pub struct ExhaustiveSolver {
    limits: SolverLimits,
}

impl ExhaustiveSolver {
    pub const NAME: &'static str = "exhaustive";

    pub fn new(limits: SolverLimits) -> Self {
        ExhaustiveSolver { limits }
    }
}

impl DiscreteSolver for ExhaustiveSolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_exact(&self) -> bool {
        true
    }

    fn solve(&self, problem: &OptimizationProblem) -> EngineResult<AllocationResult> {
        let n = problem.num_variables();
        let k = problem.budget;
        if k > n {
            return Err(EngineError::OptimizationFailed {
                solver: Self::NAME.into(),
                reason: format!("Budget {k} exceeds {n} variables"),
            });
        }

        match binomial(n, k) {
            Some(count) if count <= self.limits.max_evaluations => {}
            _ => {
                return Err(EngineError::OptimizationFailed {
                    solver: Self::NAME.into(),
                    reason: format!(
                        "C({n}, {k}) subsets exceed the evaluation cap of {}",
                        self.limits.max_evaluations
                    ),
                });
            }
        }

        let mut deadline = Deadline::start(Self::NAME, self.limits);
        let mut combo: Vec<usize> = (0..k).collect();
        let mut best = combo.clone();
        let mut best_value = f64::INFINITY;

        loop {
            deadline.tick()?;
            let value = problem.subset_objective(&combo);
            if value < best_value {
                best_value = value;
                best.clone_from(&combo);
            }
            if !next_combination(&mut combo, n) {
                break;
            }
        }

        if !best_value.is_finite() {
            return Err(EngineError::OptimizationFailed {
                solver: Self::NAME.into(),
                reason: "No subset has a finite objective".into(),
            });
        }

        debug!(
            evaluations = deadline.evaluations(),
            objective = best_value,
            "Exhaustive search finished"
        );
        AllocationResult::from_selection(problem, &best, Self::NAME)
    }
}

/// Advance `combo` (ascending indices below `n`) to the next k-subset in
/// lexicographic order. Returns false once the last subset has been seen.
fn next_combination(combo: &mut [usize], n: usize) -> bool {
    let k = combo.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if combo[i] < n - k + i {
            combo[i] += 1;
            for j in (i + 1)..k {
                combo[j] = combo[j - 1] + 1;
            }
            return true;
        }
    }
    false
}
