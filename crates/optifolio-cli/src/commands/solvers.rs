use serde_json::{json, Value};

use optifolio_core::config::{SolverConfig, SolverKind};
use optifolio_core::optimization::solver::build_solver;

/// Describe the available selection backends.
pub fn run_solvers() -> Result<Value, Box<dyn std::error::Error>> {
    let backends = [
        (
            SolverKind::Exhaustive,
            "Enumerates every subset of exactly `budget` assets; optimal, exponential in N",
        ),
        (
            SolverKind::Annealing,
            "Simulated annealing over budget-preserving swaps; seedable, not guaranteed optimal",
        ),
    ];

    let rows: Vec<Value> = backends
        .iter()
        .map(|(kind, description)| {
            let config = SolverConfig {
                kind: *kind,
                ..SolverConfig::default()
            };
            let solver = build_solver(&config, 0, 0, None);
            json!({
                "name": solver.name(),
                "exact": solver.is_exact(),
                "description": description,
            })
        })
        .collect();
    Ok(Value::Array(rows))
}
