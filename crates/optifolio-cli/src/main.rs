mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::estimate::EstimateArgs;
use commands::optimize::OptimizeArgs;

/// Budget-constrained portfolio selection with Monte Carlo risk simulation
#[derive(Parser)]
#[command(
    name = "optifolio",
    version,
    about = "Budget-constrained portfolio selection with Monte Carlo risk simulation",
    long_about = "Selects exactly `budget` assets from a candidate set by minimizing \
                  risk_factor * variance minus expected return, then reports the \
                  portfolio's return, volatility, Sharpe ratio and simulated \
                  5th/95th percentile outcomes."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log per-stage detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Select and evaluate a portfolio from a JSON request
    Optimize(OptimizeArgs),
    /// Estimate annualized returns and covariance only
    Estimate(EstimateArgs),
    /// List the available solver backends
    Solvers,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` overrides
/// the level chosen by `--verbose`.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::optimize::run_optimize(args),
        Commands::Estimate(args) => commands::estimate::run_estimate(args),
        Commands::Solvers => commands::solvers::run_solvers(),
        Commands::Version => {
            println!("optifolio {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(if output::is_failure(&value) { 1 } else { 0 });
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
