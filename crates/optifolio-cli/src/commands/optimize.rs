use clap::{Args, ValueEnum};
use serde_json::Value;
use tracing::debug;

use optifolio_core::config::{EngineConfig, SolverKind};
use optifolio_core::engine::boundary::{respond, EngineResponse, ErrorResponse, OptimizationRequest};
use optifolio_core::EngineError;

use crate::input;

#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to a JSON optimization request (stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Engine configuration file (YAML or JSON)
    #[arg(long)]
    pub config: Option<String>,

    /// Seed for the solver and the Monte Carlo simulation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Solver backend
    #[arg(long, value_enum)]
    pub solver: Option<SolverArg>,

    /// Number of Monte Carlo paths
    #[arg(long)]
    pub simulations: Option<u32>,

    /// Simulation horizon in trading days
    #[arg(long)]
    pub horizon: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SolverArg {
    Auto,
    Exhaustive,
    Annealing,
}

impl From<SolverArg> for SolverKind {
    fn from(arg: SolverArg) -> Self {
        match arg {
            SolverArg::Auto => SolverKind::Auto,
            SolverArg::Exhaustive => SolverKind::Exhaustive,
            SolverArg::Annealing => SolverKind::Annealing,
        }
    }
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let raw = input::read_request(args.input.as_deref(), "optimize")?;
    let file_config = args
        .config
        .as_deref()
        .map(input::file::read_config)
        .transpose()?;

    let mut request: OptimizationRequest = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(e) => {
            let failure = EngineResponse::Failure(ErrorResponse::from(&EngineError::from(e)));
            return Ok(serde_json::to_value(failure)?);
        }
    };

    let config = merge_config(request.config.take(), file_config, &args);
    debug!(?config, "Resolved engine configuration");
    request.config = Some(config);

    Ok(serde_json::to_value(respond(&request))?)
}

/// Defaults < config file < request config < command-line flags.
fn merge_config(
    from_request: Option<EngineConfig>,
    from_file: Option<EngineConfig>,
    args: &OptimizeArgs,
) -> EngineConfig {
    let mut config = from_request.or(from_file).unwrap_or_default();
    if let Some(seed) = args.seed {
        config.simulation.seed = Some(seed);
    }
    if let Some(solver) = args.solver {
        config.solver.kind = solver.into();
    }
    if let Some(n) = args.simulations {
        config.simulation.num_simulations = n;
    }
    if let Some(days) = args.horizon {
        config.simulation.time_horizon_days = days;
    }
    config
}
