use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::linalg::{quadratic_form, scale_matrix, vec_dot, Matrix};
use crate::market_data::estimator::MarketStatistics;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    #[default]
    Minimize,
}

/// Budget-constrained binary quadratic program:
///
/// minimize  x' Q x + c' x   subject to  sum(x) == budget,  x in {0,1}^N
///
/// with `c = -expected_returns` and `Q = risk_factor * covariance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationProblem {
    pub linear_coefficients: Vec<f64>,
    pub quadratic_coefficients: Matrix,
    /// Exact number of variables set to 1.
    pub budget: usize,
    pub sense: Sense,
}

impl OptimizationProblem {
    pub fn num_variables(&self) -> usize {
        self.linear_coefficients.len()
    }

    /// Objective of an arbitrary (possibly fractional) decision vector.
    pub fn objective(&self, x: &[f64]) -> f64 {
        quadratic_form(x, &self.quadratic_coefficients) + vec_dot(&self.linear_coefficients, x)
    }

    /// Objective of the 0/1 vector whose ones sit at `selected`.
    pub fn subset_objective(&self, selected: &[usize]) -> f64 {
        let mut value = 0.0;
        for &i in selected {
            value += self.linear_coefficients[i];
            for &j in selected {
                value += self.quadratic_coefficients[i][j];
            }
        }
        value
    }

    /// Change in objective when `out` leaves and `into` joins `selected`
    /// (`out` must be selected, `into` must not be).
    pub fn swap_delta(&self, selected: &[usize], out: usize, into: usize) -> f64 {
        let q = &self.quadratic_coefficients;
        let mut delta = self.linear_coefficients[into] - self.linear_coefficients[out];
        delta += q[into][into] - q[out][out];
        for &k in selected {
            if k == out {
                continue;
            }
            delta += q[into][k] + q[k][into] - q[out][k] - q[k][out];
        }
        delta
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the selection problem from market statistics.
///
/// `risk_factor = 0` reduces the objective to picking the `budget` assets
/// with the highest expected returns.
pub fn formulate(
    stats: &MarketStatistics,
    risk_factor: f64,
    budget: i64,
) -> EngineResult<OptimizationProblem> {
    stats.check_dimensions()?;
    let n = stats.num_assets();

    if !(risk_factor.is_finite() && risk_factor >= 0.0) {
        return Err(EngineError::InvalidInput {
            field: "risk_factor".into(),
            reason: format!("Must be a non-negative number, got {risk_factor}"),
        });
    }
    if budget < 0 || budget as u64 > n as u64 {
        return Err(EngineError::InvalidBudget {
            budget,
            num_assets: n,
        });
    }

    debug!(assets = n, risk_factor, budget, "Formulated selection problem");

    Ok(OptimizationProblem {
        linear_coefficients: stats.expected_returns.iter().map(|r| -r).collect(),
        quadratic_coefficients: scale_matrix(&stats.covariance_matrix, risk_factor),
        budget: budget as usize,
        sense: Sense::Minimize,
    })
}
