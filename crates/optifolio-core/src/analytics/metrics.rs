use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::linalg::{quadratic_form, select_submatrix, select_vector, vec_dot};
use crate::market_data::estimator::MarketStatistics;
use crate::optimization::solver::AllocationResult;
use crate::types::RISK_FREE_RATE;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Risk/return profile of the selected portfolio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    /// Weights of the selected assets (same order as `selected_indices`),
    /// summing to 1. Empty for an empty portfolio.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub normalized_weights: Vec<f64>,
    /// Annualized expected return: sum(w_i * mu_i).
    pub expected_return: f64,
    /// Annualized volatility: sqrt(w' * Sigma * w).
    pub volatility: f64,
    /// (return - rf) / volatility; defined as exactly 0 when volatility is 0.
    pub sharpe_ratio: f64,
}

impl PortfolioMetrics {
    /// Metrics of a portfolio holding nothing: every field zero.
    pub fn empty() -> Self {
        PortfolioMetrics::default()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized_weights.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Portfolio metrics using the standard 2% risk-free rate.
pub fn compute_metrics(
    stats: &MarketStatistics,
    allocation: &AllocationResult,
) -> EngineResult<PortfolioMetrics> {
    compute_metrics_with_rate(stats, allocation, RISK_FREE_RATE)
}

/// Portfolio metrics for the selected subset.
///
/// Raw decision values of the selected assets are normalized into weights.
/// An empty selection yields [`PortfolioMetrics::empty`].
pub fn compute_metrics_with_rate(
    stats: &MarketStatistics,
    allocation: &AllocationResult,
    risk_free_rate: f64,
) -> EngineResult<PortfolioMetrics> {
    stats.check_dimensions()?;
    let selected = &allocation.selected_indices;
    if selected.is_empty() {
        return Ok(PortfolioMetrics::empty());
    }
    if let Some(&bad) = selected.iter().find(|&&i| i >= stats.num_assets()) {
        return Err(EngineError::InvalidInput {
            field: "selected_indices".into(),
            reason: format!("Index {} out of range (n={})", bad, stats.num_assets()),
        });
    }
    if allocation.raw_values.len() != stats.num_assets() {
        return Err(EngineError::InvalidInput {
            field: "raw_values".into(),
            reason: format!(
                "Expected {} values but got {}",
                stats.num_assets(),
                allocation.raw_values.len()
            ),
        });
    }

    let raw = select_vector(&allocation.raw_values, selected);
    let total: f64 = raw.iter().sum();
    if !(total > 0.0) {
        return Err(EngineError::InvalidInput {
            field: "raw_values".into(),
            reason: "Selected decision values sum to zero".into(),
        });
    }
    let weights: Vec<f64> = raw.iter().map(|v| v / total).collect();

    let returns = select_vector(&stats.expected_returns, selected);
    let covariance = select_submatrix(&stats.covariance_matrix, selected);

    let expected_return = vec_dot(&weights, &returns);
    // Clamp round-off below zero before the square root.
    let volatility = quadratic_form(&weights, &covariance).max(0.0).sqrt();
    let sharpe_ratio = compute_sharpe(expected_return, risk_free_rate, volatility);

    Ok(PortfolioMetrics {
        normalized_weights: weights,
        expected_return,
        volatility,
        sharpe_ratio,
    })
}

/// Compute Sharpe ratio with division-by-zero guard.
fn compute_sharpe(ret: f64, rf: f64, volatility: f64) -> f64 {
    if volatility == 0.0 {
        0.0
    } else {
        (ret - rf) / volatility
    }
}
