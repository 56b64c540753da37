use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::engine::orchestrator::{Diagnostics, PortfolioEngine};
use crate::error::EngineError;
use crate::monte_carlo::simulation::SimulationSummary;
use crate::types::{deserialize_assets, AssetId, PriceSeries};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One optimization request as received from a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    /// Either a JSON list or a comma-separated string such as
    /// `"bitcoin, ethereum"`.
    #[serde(deserialize_with = "deserialize_assets")]
    pub assets: Vec<AssetId>,
    pub price_history: HashMap<AssetId, PriceSeries>,
    pub risk_factor: f64,
    pub budget: i64,
    /// Replaces the engine configuration for this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<EngineConfig>,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Headline metrics reported to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsView {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub status: String,
    pub allocation: BTreeMap<AssetId, f64>,
    pub metrics: MetricsView,
    pub monte_carlo: SimulationSummary,
    pub diagnostics: Diagnostics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    /// Failure kind, e.g. `InvalidBudgetError`.
    pub kind: String,
    pub message: String,
}

/// Result object handed back across the host boundary: either the full
/// result or a structured error, never a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EngineResponse {
    Success(SuccessResponse),
    Failure(ErrorResponse),
}

impl EngineResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, EngineResponse::Success(_))
    }
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        ErrorResponse {
            status: "error".into(),
            kind: err.kind().into(),
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Serve one request with the request's own configuration, or defaults.
pub fn respond(request: &OptimizationRequest) -> EngineResponse {
    respond_with(&EngineConfig::default(), request)
}

/// Serve one request. A configuration embedded in the request replaces
/// `base`. Every engine failure becomes [`EngineResponse::Failure`].
pub fn respond_with(base: &EngineConfig, request: &OptimizationRequest) -> EngineResponse {
    let config = request.config.clone().unwrap_or_else(|| base.clone());
    match run(config, request) {
        Ok(success) => EngineResponse::Success(success),
        Err(err) => {
            error!(kind = err.kind(), %err, "Optimization request failed");
            EngineResponse::Failure(ErrorResponse::from(&err))
        }
    }
}

/// Parse a JSON request and serve it. Malformed JSON is reported as a
/// `SerializationError` response.
pub fn respond_json(base: &EngineConfig, input: &str) -> EngineResponse {
    match serde_json::from_str::<OptimizationRequest>(input) {
        Ok(request) => respond_with(base, &request),
        Err(e) => {
            let err = EngineError::from(e);
            error!(%err, "Could not parse optimization request");
            EngineResponse::Failure(ErrorResponse::from(&err))
        }
    }
}

fn run(config: EngineConfig, request: &OptimizationRequest) -> Result<SuccessResponse, EngineError> {
    let engine = PortfolioEngine::new(config)?;
    let output = engine.optimize(
        &request.assets,
        &request.price_history,
        request.risk_factor,
        request.budget,
    )?;
    let result = output.result;
    info!(
        selected = result.allocation.len(),
        solver = %result.diagnostics.solver,
        "Optimization request served"
    );
    Ok(SuccessResponse {
        status: "success".into(),
        allocation: result.allocation,
        metrics: MetricsView {
            expected_return: result.metrics.expected_return,
            volatility: result.metrics.volatility,
            sharpe_ratio: result.metrics.sharpe_ratio,
        },
        monte_carlo: result.simulation,
        diagnostics: result.diagnostics,
        warnings: output.warnings,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
