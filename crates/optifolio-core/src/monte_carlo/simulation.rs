use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::analytics::metrics::PortfolioMetrics;
use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::linalg::{cholesky, is_zero_matrix, scale_matrix, select_submatrix, select_vector, vec_dot, Matrix};
use crate::market_data::estimator::MarketStatistics;
use crate::optimization::solver::AllocationResult;
use crate::types::TRADING_DAYS_PER_YEAR;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Distribution summary of simulated cumulative portfolio returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    #[serde(rename = "5th_percentile")]
    pub percentile_5: f64,
    pub mean_return: f64,
    #[serde(rename = "95th_percentile")]
    pub percentile_95: f64,
}

impl SimulationSummary {
    /// Summary of an empty portfolio: every field zero.
    pub fn empty() -> Self {
        SimulationSummary::default()
    }
}

/// Read-only inputs shared by every simulated path.
struct PathModel<'a> {
    /// Portfolio daily drift: w' * mu_daily.
    drift: f64,
    /// Portfolio loading on the independent shocks: L' * w.
    loadings: Vec<f64>,
    horizon: u32,
    normal: &'a Normal,
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Compute the percentile value from a **sorted** slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

fn summarize(mut cumulative: Vec<f64>) -> SimulationSummary {
    cumulative.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mean_return = cumulative.iter().sum::<f64>() / cumulative.len() as f64;
    SimulationSummary {
        percentile_5: percentile_sorted(&cumulative, 5.0),
        mean_return,
        percentile_95: percentile_sorted(&cumulative, 95.0),
    }
}

// ---------------------------------------------------------------------------
// Path simulation
// ---------------------------------------------------------------------------

/// Compound one path of daily portfolio returns and return its total return.
///
/// Each day draws one independent standard normal per selected asset. The
/// correlated asset returns are `mu + L z`, so the weighted portfolio return
/// collapses to `w' mu + (L' w)' z`.
fn simulate_path(seed: u64, model: &PathModel<'_>) -> f64 {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut growth = 1.0_f64;
    for _ in 0..model.horizon {
        let shock: f64 = model
            .loadings
            .iter()
            .map(|b| b * rng.sample(model.normal))
            .sum();
        growth *= 1.0 + model.drift + shock;
    }
    growth - 1.0
}

#[cfg(not(feature = "parallel"))]
fn run_paths(seeds: &[u64], model: &PathModel<'_>) -> Vec<f64> {
    seeds.iter().map(|&s| simulate_path(s, model)).collect()
}

#[cfg(feature = "parallel")]
fn run_paths(seeds: &[u64], model: &PathModel<'_>) -> Vec<f64> {
    seeds.par_iter().map(|&s| simulate_path(s, model)).collect()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the simulation with an RNG built from `config.seed` (OS entropy when
/// no seed is set).
pub fn simulate_seeded(
    stats: &MarketStatistics,
    allocation: &AllocationResult,
    metrics: &PortfolioMetrics,
    config: &SimulationConfig,
) -> EngineResult<SimulationSummary> {
    let mut rng = match config.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    simulate(stats, allocation, metrics, config, &mut rng)
}

/// Monte Carlo forward simulation of the selected portfolio, with 252
/// trading days per year.
pub fn simulate<R: Rng + ?Sized>(
    stats: &MarketStatistics,
    allocation: &AllocationResult,
    metrics: &PortfolioMetrics,
    config: &SimulationConfig,
    rng: &mut R,
) -> EngineResult<SimulationSummary> {
    simulate_annualized(stats, allocation, metrics, config, TRADING_DAYS_PER_YEAR, rng)
}

/// Monte Carlo forward simulation of the selected portfolio.
///
/// Annual statistics of the selected assets are de-annualized by
/// `trading_days`, correlated daily returns are drawn through the Cholesky
/// factor of the daily covariance, weighted by the portfolio weights and
/// compounded over `time_horizon_days`. One seed per path is drawn from
/// `rng`, so results depend only on `rng`'s state, never on scheduling.
///
/// An empty portfolio yields [`SimulationSummary::empty`]. A selected
/// covariance that is identically zero simulates deterministic paths; any
/// other covariance that is not positive definite is an error. That
/// includes a zero-variance asset (a stablecoin, say) selected next to a
/// volatile one: the covariance is only positive semi-definite and fails
/// with `NonPositiveDefiniteCovariance`.
pub fn simulate_annualized<R: Rng + ?Sized>(
    stats: &MarketStatistics,
    allocation: &AllocationResult,
    metrics: &PortfolioMetrics,
    config: &SimulationConfig,
    trading_days: f64,
    rng: &mut R,
) -> EngineResult<SimulationSummary> {
    let selected = &allocation.selected_indices;
    if selected.is_empty() {
        return Ok(SimulationSummary::empty());
    }

    // Validation
    if config.num_simulations < 1 {
        return Err(EngineError::InvalidInput {
            field: "num_simulations".into(),
            reason: "Must be at least 1".into(),
        });
    }
    if config.time_horizon_days < 1 {
        return Err(EngineError::InvalidInput {
            field: "time_horizon_days".into(),
            reason: "Must be at least 1".into(),
        });
    }
    if metrics.normalized_weights.len() != selected.len() {
        return Err(EngineError::InvalidInput {
            field: "normalized_weights".into(),
            reason: format!(
                "Expected {} weights but got {}",
                selected.len(),
                metrics.normalized_weights.len()
            ),
        });
    }
    stats.check_dimensions()?;
    if let Some(&bad) = selected.iter().find(|&&i| i >= stats.num_assets()) {
        return Err(EngineError::InvalidInput {
            field: "selected_indices".into(),
            reason: format!("Index {} out of range (n={})", bad, stats.num_assets()),
        });
    }

    let daily_returns: Vec<f64> = select_vector(&stats.expected_returns, selected)
        .into_iter()
        .map(|r| r / trading_days)
        .collect();
    let daily_cov = scale_matrix(
        &select_submatrix(&stats.covariance_matrix, selected),
        1.0 / trading_days,
    );

    let factor: Matrix = if is_zero_matrix(&daily_cov) {
        vec![vec![0.0; selected.len()]; selected.len()]
    } else {
        cholesky(&daily_cov).map_err(|pivot| EngineError::NonPositiveDefiniteCovariance {
            assets: selected.iter().map(|&i| stats.asset_ids[i].clone()).collect(),
            pivot,
        })?
    };

    let weights = &metrics.normalized_weights;
    let loadings: Vec<f64> = (0..selected.len())
        .map(|j| (j..selected.len()).map(|i| factor[i][j] * weights[i]).sum())
        .collect();

    let normal = Normal::new(0.0, 1.0).map_err(|e| EngineError::InvalidInput {
        field: "distribution".into(),
        reason: format!("Invalid Normal parameters: {e}"),
    })?;
    let model = PathModel {
        drift: vec_dot(weights, &daily_returns),
        loadings,
        horizon: config.time_horizon_days,
        normal: &normal,
    };

    let seeds: Vec<u64> = (0..config.num_simulations).map(|_| rng.gen()).collect();
    let cumulative = run_paths(&seeds, &model);

    debug!(
        paths = config.num_simulations,
        horizon = config.time_horizon_days,
        assets = selected.len(),
        "Monte Carlo simulation finished"
    );

    Ok(summarize(cumulative))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
