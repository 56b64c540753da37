use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analytics::metrics::{compute_metrics_with_rate, PortfolioMetrics};
use crate::config::EngineConfig;
use crate::market_data::estimator::{estimate_annualized, MarketStatistics};
use crate::monte_carlo::simulation::{simulate_annualized, SimulationSummary};
use crate::optimization::problem::formulate;
use crate::optimization::solver::{build_solver, AllocationResult, DiscreteSolver};
use crate::types::{with_metadata, AssetId, ComputationOutput, PriceSeries};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How the selection was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub solver: String,
    pub exact_solver: bool,
    pub objective_value: f64,
    pub budget: usize,
    pub selected_count: usize,
    /// Aligned price observations per asset.
    pub observations: usize,
    /// Seed that reproduces this run, when the engine chose or received one.
    pub seed: Option<u64>,
}

/// Full result of one optimization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioOptimization {
    /// Normalized weight per selected asset. Empty when nothing was selected.
    pub allocation: BTreeMap<AssetId, f64>,
    pub metrics: PortfolioMetrics,
    pub simulation: SimulationSummary,
    pub statistics: MarketStatistics,
    pub selection: AllocationResult,
    pub diagnostics: Diagnostics,
}

/// Runs estimation, formulation, solving, metrics and simulation in order.
///
/// The engine holds configuration only; every call works on request-local
/// data, so one engine can serve concurrent requests.
pub struct PortfolioEngine {
    config: EngineConfig,
    solver: Option<Box<dyn DiscreteSolver + Send + Sync>>,
}

impl Default for PortfolioEngine {
    fn default() -> Self {
        PortfolioEngine {
            config: EngineConfig::default(),
            solver: None,
        }
    }
}

impl std::fmt::Debug for PortfolioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioEngine")
            .field("config", &self.config)
            .field("solver", &self.solver.as_ref().map(|s| s.name()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Optimize with the default configuration.
pub fn optimize(
    assets: &[AssetId],
    price_history: &HashMap<AssetId, PriceSeries>,
    risk_factor: f64,
    budget: i64,
) -> EngineResult<ComputationOutput<PortfolioOptimization>> {
    PortfolioEngine::default().optimize(assets, price_history, risk_factor, budget)
}

impl PortfolioEngine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(PortfolioEngine {
            config,
            solver: None,
        })
    }

    /// Use `solver` for every request instead of the configured backend.
    pub fn with_solver(mut self, solver: Box<dyn DiscreteSolver + Send + Sync>) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Optimize using the configured seed, or a fresh one recorded in the
    /// diagnostics when none is configured.
    pub fn optimize(
        &self,
        assets: &[AssetId],
        price_history: &HashMap<AssetId, PriceSeries>,
        risk_factor: f64,
        budget: i64,
    ) -> EngineResult<ComputationOutput<PortfolioOptimization>> {
        let seed = self
            .config
            .simulation
            .seed
            .unwrap_or_else(|| StdRng::from_entropy().gen());
        let mut rng = StdRng::seed_from_u64(seed);
        let mut output =
            self.optimize_with_rng(assets, price_history, risk_factor, budget, &mut rng)?;
        output.result.diagnostics.seed = Some(seed);
        Ok(output)
    }

    /// Optimize drawing all randomness (annealing seed, simulation paths)
    /// from `rng`.
    pub fn optimize_with_rng<R: Rng + ?Sized>(
        &self,
        assets: &[AssetId],
        price_history: &HashMap<AssetId, PriceSeries>,
        risk_factor: f64,
        budget: i64,
        rng: &mut R,
    ) -> EngineResult<ComputationOutput<PortfolioOptimization>> {
        let start = Instant::now();
        let mut warnings: Vec<String> = Vec::new();
        let cfg = &self.config;

        info!(
            assets = assets.len(),
            risk_factor, budget, "Starting portfolio optimization"
        );

        let statistics = estimate_annualized(assets, price_history, cfg.trading_days_per_year)?;
        let problem = formulate(&statistics, risk_factor, budget)?;

        let solver_seed: u64 = rng.gen();
        let built;
        let solver: &dyn DiscreteSolver = match &self.solver {
            Some(s) => &**s,
            None => {
                built = build_solver(
                    &cfg.solver,
                    statistics.num_assets(),
                    problem.budget,
                    Some(solver_seed),
                );
                &*built
            }
        };

        let selection = solver
            .solve(&problem)?
            .rethreshold(&problem, cfg.selection_threshold)?;
        debug!(
            solver = solver.name(),
            objective = selection.objective_value,
            selected = selection.selected_indices.len(),
            "Solver finished"
        );

        if selection.selected_indices.len() != problem.budget {
            warn!(
                solver = solver.name(),
                selected = selection.selected_indices.len(),
                budget = problem.budget,
                "Selection size differs from budget"
            );
            warnings.push(format!(
                "{} solver selected {} assets for a budget of {}; selection kept as produced",
                solver.name(),
                selection.selected_indices.len(),
                problem.budget
            ));
        }
        if selection.is_empty() {
            warn!("No assets selected; returning empty portfolio");
            warnings.push("No assets selected; metrics and simulation are zero".into());
        }

        let metrics = compute_metrics_with_rate(&statistics, &selection, cfg.risk_free_rate)?;
        let simulation = simulate_annualized(
            &statistics,
            &selection,
            &metrics,
            &cfg.simulation,
            cfg.trading_days_per_year,
            rng,
        )?;

        let allocation: BTreeMap<AssetId, f64> = selection
            .selected_indices
            .iter()
            .zip(metrics.normalized_weights.iter())
            .map(|(&i, &w)| (statistics.asset_ids[i].clone(), w))
            .collect();

        let diagnostics = Diagnostics {
            solver: solver.name().to_string(),
            exact_solver: solver.is_exact(),
            objective_value: selection.objective_value,
            budget: problem.budget,
            selected_count: selection.selected_indices.len(),
            observations: statistics.observations,
            seed: None,
        };

        info!(
            selected = diagnostics.selected_count,
            expected_return = metrics.expected_return,
            volatility = metrics.volatility,
            sharpe_ratio = metrics.sharpe_ratio,
            "Portfolio optimization finished"
        );

        let result = PortfolioOptimization {
            allocation,
            metrics,
            simulation,
            statistics,
            selection,
            diagnostics,
        };

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "Budget-constrained binary quadratic selection with Monte Carlo risk simulation",
            &serde_json::json!({
                "risk_factor": risk_factor,
                "budget": budget,
                "trading_days_per_year": cfg.trading_days_per_year,
                "risk_free_rate": cfg.risk_free_rate,
                "selection_threshold": cfg.selection_threshold,
                "num_simulations": cfg.simulation.num_simulations,
                "time_horizon_days": cfg.simulation.time_horizon_days,
                "return_model": "daily log-returns, sample covariance",
            }),
            warnings,
            elapsed,
            result,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
