use std::collections::HashMap;

use optifolio_core::analytics::metrics::compute_metrics;
use optifolio_core::config::SimulationConfig;
use optifolio_core::market_data::estimator::{estimate, MarketStatistics};
use optifolio_core::market_data::provider::{PriceHistorySource, StaticPriceHistory};
use optifolio_core::monte_carlo::simulation::{simulate_seeded, SimulationSummary};
use optifolio_core::optimization::exhaustive::ExhaustiveSolver;
use optifolio_core::optimization::problem::formulate;
use optifolio_core::optimization::solver::DiscreteSolver;
use optifolio_core::{
    respond, AssetId, EngineConfig, EngineError, EngineResponse, OptimizationRequest,
    PortfolioEngine, PriceSeries,
};

const SEED: u64 = 42;

fn ids(names: &[&str]) -> Vec<AssetId> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Geometric trend with a deterministic wobble. Distinct frequencies keep the
/// covariance full rank.
fn trending(start: f64, daily_growth: f64, wobble: f64, frequency: f64, len: usize) -> PriceSeries {
    PriceSeries::from_prices((0..len).map(|t| {
        let t = t as f64;
        start * (1.0 + daily_growth).powf(t) * (1.0 + wobble * (frequency * t).sin())
    }))
}

fn seeded_engine(num_simulations: u32) -> PortfolioEngine {
    let mut config = EngineConfig::default();
    config.simulation.seed = Some(SEED);
    config.simulation.num_simulations = num_simulations;
    PortfolioEngine::new(config).unwrap()
}

fn four_asset_market() -> (Vec<AssetId>, HashMap<AssetId, PriceSeries>) {
    let assets = ids(&["bitcoin", "ethereum", "solana", "cardano"]);
    let mut history = HashMap::new();
    history.insert("bitcoin".to_string(), trending(30_000.0, 0.0015, 0.010, 0.9, 91));
    history.insert("ethereum".to_string(), trending(2_000.0, 0.0010, 0.020, 1.7, 91));
    history.insert("solana".to_string(), trending(20.0, 0.0040, 0.040, 2.3, 91));
    history.insert("cardano".to_string(), trending(0.3, -0.0005, 0.030, 3.1, 91));
    (assets, history)
}

// ---------------------------------------------------------------------------
// Edge-case scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_flat_prices_give_zero_statistics_and_metrics() {
    let assets = ids(&["a", "b"]);
    let mut history = HashMap::new();
    history.insert("a".to_string(), PriceSeries::from_prices(vec![100.0; 91]));
    history.insert("b".to_string(), PriceSeries::from_prices(vec![100.0; 91]));

    let stats = estimate(&assets, &history).unwrap();
    assert_eq!(stats.expected_returns, vec![0.0, 0.0]);
    assert_eq!(stats.covariance_matrix, vec![vec![0.0, 0.0], vec![0.0, 0.0]]);

    for risk_factor in [0.0, 1.0, 5.0] {
        let out = seeded_engine(100)
            .optimize(&assets, &history, risk_factor, 1)
            .unwrap();
        let r = out.result;
        assert_eq!(r.allocation.len(), 1);
        assert_eq!(r.allocation.values().copied().collect::<Vec<_>>(), vec![1.0]);
        assert_eq!(r.metrics.expected_return, 0.0);
        assert_eq!(r.metrics.volatility, 0.0);
        assert_eq!(r.metrics.sharpe_ratio, 0.0);
        assert_eq!(r.simulation, SimulationSummary::empty());
    }
}

#[test]
fn test_zero_budget_is_an_empty_portfolio() {
    let (assets, history) = four_asset_market();
    let out = seeded_engine(100).optimize(&assets, &history, 1.0, 0).unwrap();
    assert!(out.result.selection.selected_indices.is_empty());
    assert!(out.result.allocation.is_empty());
    assert_eq!(out.result.metrics.expected_return, 0.0);
    assert_eq!(out.result.metrics.volatility, 0.0);
    assert_eq!(out.result.metrics.sharpe_ratio, 0.0);
    assert_eq!(out.result.simulation, SimulationSummary::empty());
}

#[test]
fn test_budget_above_asset_count_is_rejected() {
    let (assets, history) = four_asset_market();
    let err = seeded_engine(100)
        .optimize(&assets, &history, 1.0, 5)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidBudget {
            budget: 5,
            num_assets: 4
        }
    ));
}

#[test]
fn test_negative_budget_is_rejected() {
    let (assets, history) = four_asset_market();
    let err = seeded_engine(100)
        .optimize(&assets, &history, 1.0, -1)
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidBudgetError");
}

#[test]
fn test_zero_price_is_rejected() {
    let (assets, mut history) = four_asset_market();
    let mut prices = history["solana"].prices();
    prices[40] = 0.0;
    history.insert("solana".to_string(), PriceSeries::from_prices(prices));

    let err = estimate(&assets, &history).unwrap_err();
    assert!(matches!(err, EngineError::NonPositivePrice { ref asset, .. } if asset == "solana"));
}

#[test]
fn test_exact_backend_matches_brute_force_enumeration() {
    let stats = MarketStatistics {
        asset_ids: ids(&["a", "b", "c"]),
        expected_returns: vec![0.12, 0.10, 0.07],
        covariance_matrix: vec![
            vec![0.0400, 0.0060, 0.0020],
            vec![0.0060, 0.0225, 0.0030],
            vec![0.0020, 0.0030, 0.0100],
        ],
        observations: 91,
    };
    let problem = formulate(&stats, 1.0, 2).unwrap();
    let result = ExhaustiveSolver::default().solve(&problem).unwrap();

    let pairs = [[0, 1], [0, 2], [1, 2]];
    let best = pairs
        .iter()
        .map(|p| (problem.subset_objective(p), *p))
        .fold((f64::INFINITY, [0, 0]), |acc, cur| if cur.0 < acc.0 { cur } else { acc });

    assert_eq!(result.selected_indices, best.1.to_vec());
    assert!((result.objective_value - best.0).abs() < 1e-12);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn test_weights_sum_to_one_for_every_budget() {
    let (assets, history) = four_asset_market();
    for budget in 1..=4 {
        let out = seeded_engine(50)
            .optimize(&assets, &history, 1.0, budget)
            .unwrap();
        let total: f64 = out.result.allocation.values().sum();
        assert!((total - 1.0).abs() < 1e-9, "budget {budget}: sum {total}");
        assert_eq!(out.result.allocation.len(), budget as usize);
    }
}

#[test]
fn test_seeded_optimization_is_idempotent() {
    let (assets, history) = four_asset_market();
    let a = seeded_engine(300).optimize(&assets, &history, 0.7, 2).unwrap();
    let b = seeded_engine(300).optimize(&assets, &history, 0.7, 2).unwrap();
    assert_eq!(a.result, b.result);
}

#[test]
fn test_zero_risk_factor_maximizes_expected_return() {
    let (assets, history) = four_asset_market();
    let stats = estimate(&assets, &history).unwrap();
    let out = seeded_engine(50).optimize(&assets, &history, 0.0, 2).unwrap();

    let mut by_return: Vec<usize> = (0..stats.num_assets()).collect();
    by_return.sort_by(|&i, &j| {
        stats.expected_returns[j]
            .partial_cmp(&stats.expected_returns[i])
            .unwrap()
    });
    let mut top_two = by_return[..2].to_vec();
    top_two.sort_unstable();
    assert_eq!(out.result.selection.selected_indices, top_two);
}

#[test]
fn test_percentiles_bracket_the_mean() {
    let (assets, history) = four_asset_market();
    for budget in 1..=4 {
        let s = seeded_engine(500)
            .optimize(&assets, &history, 1.0, budget)
            .unwrap()
            .result
            .simulation;
        assert!(s.percentile_5 <= s.mean_return, "{s:?}");
        assert!(s.mean_return <= s.percentile_95, "{s:?}");
    }
}

#[test]
fn test_sharpe_matches_definition() {
    let (assets, history) = four_asset_market();
    let m = seeded_engine(50)
        .optimize(&assets, &history, 1.0, 3)
        .unwrap()
        .result
        .metrics;
    assert!(m.volatility > 0.0);
    assert!((m.sharpe_ratio - (m.expected_return - 0.02) / m.volatility).abs() < 1e-12);
}

// ---------------------------------------------------------------------------
// Component pipeline
// ---------------------------------------------------------------------------

#[test]
fn test_pipeline_from_price_source() {
    let (assets, history) = four_asset_market();
    let source = StaticPriceHistory::new(history);
    let fetched = source.fetch(&assets, 60).unwrap();
    assert!(fetched.values().all(|s| s.len() == 61));

    let stats = estimate(&assets, &fetched).unwrap();
    assert_eq!(stats.observations, 61);
    let problem = formulate(&stats, 1.0, 2).unwrap();
    let allocation = ExhaustiveSolver::default().solve(&problem).unwrap();
    let metrics = compute_metrics(&stats, &allocation).unwrap();
    let config = SimulationConfig {
        num_simulations: 200,
        time_horizon_days: 30,
        seed: Some(SEED),
    };
    let a = simulate_seeded(&stats, &allocation, &metrics, &config).unwrap();
    let b = simulate_seeded(&stats, &allocation, &metrics, &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_boundary_never_faults() {
    let (assets, history) = four_asset_market();
    let request = OptimizationRequest {
        assets,
        price_history: history,
        risk_factor: f64::NAN,
        budget: 2,
        config: None,
    };
    match respond(&request) {
        EngineResponse::Failure(e) => {
            assert_eq!(e.status, "error");
            assert_eq!(e.kind, "InvalidInputError");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}
