use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::AnnealingConfig;
use crate::error::EngineError;
use crate::optimization::problem::OptimizationProblem;
use crate::optimization::solver::{AllocationResult, Deadline, DiscreteSolver, SolverLimits};
use crate::EngineResult;

/// Heuristic backend: simulated annealing over fixed-size subsets.
///
/// Every move swaps one selected asset for one unselected asset, so the
/// budget equality holds at every step. The selection returned is the best
/// one visited across all restarts; it is not guaranteed to be optimal.
#[derive(Debug, Clone)]
pub struct AnnealingSolver {
    schedule: AnnealingConfig,
    limits: SolverLimits,
    seed: Option<u64>,
}

impl AnnealingSolver {
    pub const NAME: &'static str = "annealing";

    pub fn new(schedule: AnnealingConfig, limits: SolverLimits, seed: Option<u64>) -> Self {
        AnnealingSolver {
            schedule,
            limits,
            seed,
        }
    }

    /// Swap proposals per sweep: one per asset when the evaluation cap
    /// allows the full schedule, otherwise as many as fit (at least one).
    fn moves_per_sweep(&self, n: usize) -> u64 {
        let restarts = u64::from(self.schedule.restarts).max(1);
        let sweeps = u64::from(self.schedule.sweeps).max(1);
        let per_restart = self.limits.max_evaluations / restarts;
        let fit = per_restart.saturating_sub(1) / sweeps;
        (n as u64).min(fit).max(1)
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        }
    }
}

impl DiscreteSolver for AnnealingSolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_exact(&self) -> bool {
        false
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
        // Nothing to search: the only feasible subset is empty or everything.
        if k == 0 || k == n {
            let all: Vec<usize> = (0..k).collect();
            return AllocationResult::from_selection(problem, &all, Self::NAME);
        }

        let mut rng = self.rng();
        let mut deadline = Deadline::start(Self::NAME, self.limits);
        let base_temperature = self.schedule.initial_temperature * objective_scale(problem);
        let moves = self.moves_per_sweep(n);
        if moves < n as u64 {
            debug!(moves, assets = n, "Shortened sweeps to fit the evaluation cap");
        }

        let mut best: Vec<usize> = Vec::new();
        let mut best_value = f64::INFINITY;

        for _ in 0..self.schedule.restarts {
            let mut selected = index::sample(&mut rng, n, k).into_vec();
            let mut unselected: Vec<usize> = (0..n).filter(|i| !selected.contains(i)).collect();
            let mut value = problem.subset_objective(&selected);
            deadline.tick()?;
            if value < best_value {
                best_value = value;
                best.clone_from(&selected);
            }

            let mut temperature = base_temperature;
            for _ in 0..self.schedule.sweeps {
                for _ in 0..moves {
                    deadline.tick()?;
                    let out_pos = rng.gen_range(0..k);
                    let in_pos = rng.gen_range(0..n - k);
                    let delta =
                        problem.swap_delta(&selected, selected[out_pos], unselected[in_pos]);

                    let accept = delta <= 0.0 || rng.gen::<f64>() < (-delta / temperature).exp();
                    if accept {
                        std::mem::swap(&mut selected[out_pos], &mut unselected[in_pos]);
                        value += delta;
                        if value < best_value {
                            best_value = value;
                            best.clone_from(&selected);
                        }
                    }
                }
                temperature *= self.schedule.cooling_rate;
            }
        }

        if !best_value.is_finite() {
            return Err(EngineError::OptimizationFailed {
                solver: Self::NAME.into(),
                reason: "Annealing diverged to a non-finite objective".into(),
            });
        }

        best.sort_unstable();
        debug!(
            evaluations = deadline.evaluations(),
            objective = best_value,
            "Annealing finished"
        );
        AllocationResult::from_selection(problem, &best, Self::NAME)
    }
}

/// Typical magnitude of a single-asset objective term, so the temperature
/// schedule does not depend on the units of returns and covariance.
fn objective_scale(problem: &OptimizationProblem) -> f64 {
    let n = problem.num_variables().max(1) as f64;
    let linear: f64 = problem.linear_coefficients.iter().map(|c| c.abs()).sum::<f64>() / n;
    let diagonal: f64 = problem
        .quadratic_coefficients
        .iter()
        .enumerate()
        .map(|(i, row)| row[i].abs())
        .sum::<f64>()
        / n;
    let scale = linear + diagonal;
    if scale > 0.0 && scale.is_finite() {
        scale
    } else {
        1.0
    }
}
