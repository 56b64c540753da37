use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EngineError;
use crate::types::{RISK_FREE_RATE, SELECTION_THRESHOLD, TRADING_DAYS_PER_YEAR};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Engine-wide settings. Every field has a default, so an empty document
/// (`{}`) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Annualization constant for returns and covariance.
    #[serde(default = "default_trading_days")]
    pub trading_days_per_year: f64,
    /// Annual risk-free rate for the Sharpe ratio.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Raw decision values strictly above this count as selected.
    #[serde(default = "default_selection_threshold")]
    pub selection_threshold: f64,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub solver: SolverConfig,
}

/// Monte Carlo settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of simulated paths.
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    /// Trading days simulated per path.
    #[serde(default = "default_time_horizon")]
    pub time_horizon_days: u32,
    /// Optional seed for reproducibility. `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Which discrete optimizer backend to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Exhaustive when the subset count fits the evaluation cap, else
    /// annealing. Annealing shortens its sweeps to stay within the same cap
    /// and fails only when even one move per sweep does not fit.
    #[default]
    Auto,
    Exhaustive,
    Annealing,
}

/// Solver selection and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub kind: SolverKind,
    /// Upper bound on objective evaluations per solve.
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: u64,
    /// Optional wall-clock deadline per solve, in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub annealing: AnnealingConfig,
}

/// Simulated-annealing schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealingConfig {
    #[serde(default = "default_initial_temperature")]
    pub initial_temperature: f64,
    /// Geometric cooling factor applied after every sweep, in (0, 1).
    #[serde(default = "default_cooling_rate")]
    pub cooling_rate: f64,
    /// Sweeps per restart; one sweep proposes `n` swap moves.
    #[serde(default = "default_sweeps")]
    pub sweeps: u32,
    /// Independent restarts from fresh random subsets.
    #[serde(default = "default_restarts")]
    pub restarts: u32,
    /// Seed for the annealing chain. Falls back to the simulation seed.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_trading_days() -> f64 {
    TRADING_DAYS_PER_YEAR
}

fn default_risk_free_rate() -> f64 {
    RISK_FREE_RATE
}

fn default_selection_threshold() -> f64 {
    SELECTION_THRESHOLD
}

fn default_num_simulations() -> u32 {
    1_000
}

fn default_time_horizon() -> u32 {
    252
}

fn default_max_evaluations() -> u64 {
    2_000_000
}

fn default_initial_temperature() -> f64 {
    1.0
}

fn default_cooling_rate() -> f64 {
    0.95
}

fn default_sweeps() -> u32 {
    200
}

fn default_restarts() -> u32 {
    4
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            trading_days_per_year: default_trading_days(),
            risk_free_rate: default_risk_free_rate(),
            selection_threshold: default_selection_threshold(),
            simulation: SimulationConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            num_simulations: default_num_simulations(),
            time_horizon_days: default_time_horizon(),
            seed: None,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            kind: SolverKind::default(),
            max_evaluations: default_max_evaluations(),
            timeout_ms: None,
            annealing: AnnealingConfig::default(),
        }
    }
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        AnnealingConfig {
            initial_temperature: default_initial_temperature(),
            cooling_rate: default_cooling_rate(),
            sweeps: default_sweeps(),
            restarts: default_restarts(),
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl EngineConfig {
    /// Parse a configuration document. YAML is a superset of JSON, so both
    /// formats are accepted.
    pub fn from_yaml_str(contents: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !(self.trading_days_per_year.is_finite() && self.trading_days_per_year > 0.0) {
            return Err(invalid("trading_days_per_year", "Must be a positive number"));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(invalid("risk_free_rate", "Must be finite"));
        }
        if !(self.selection_threshold > 0.0 && self.selection_threshold < 1.0) {
            return Err(invalid("selection_threshold", "Must lie strictly between 0 and 1"));
        }
        if self.simulation.num_simulations == 0 {
            return Err(invalid("simulation.num_simulations", "Must be at least 1"));
        }
        if self.simulation.time_horizon_days == 0 {
            return Err(invalid("simulation.time_horizon_days", "Must be at least 1"));
        }
        if self.solver.max_evaluations == 0 {
            return Err(invalid("solver.max_evaluations", "Must be at least 1"));
        }
        let a = &self.solver.annealing;
        if !(a.initial_temperature.is_finite() && a.initial_temperature > 0.0) {
            return Err(invalid("solver.annealing.initial_temperature", "Must be positive"));
        }
        if !(a.cooling_rate > 0.0 && a.cooling_rate < 1.0) {
            return Err(invalid("solver.annealing.cooling_rate", "Must lie strictly between 0 and 1"));
        }
        if a.sweeps == 0 || a.restarts == 0 {
            return Err(invalid("solver.annealing", "sweeps and restarts must be at least 1"));
        }
        Ok(())
    }
}

impl SolverConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn invalid(field: &str, reason: &str) -> EngineError {
    EngineError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}
