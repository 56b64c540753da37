use clap::Args;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tracing::error;

use optifolio_core::engine::boundary::{EngineResponse, ErrorResponse};
use optifolio_core::market_data::estimator::{estimate_annualized, MarketStatistics};
use optifolio_core::market_data::provider::{PriceHistorySource, StaticPriceHistory};
use optifolio_core::types::deserialize_assets;
use optifolio_core::{with_metadata, AssetId, EngineConfig, EngineError, EngineResult, PriceSeries};

use crate::input;

#[derive(Args)]
pub struct EstimateArgs {
    /// Path to a JSON request with `assets` and `price_history` (stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Engine configuration file (YAML or JSON)
    #[arg(long)]
    pub config: Option<String>,

    /// Only use the trailing N days of each series
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Deserialize)]
struct EstimateRequest {
    #[serde(deserialize_with = "deserialize_assets")]
    assets: Vec<AssetId>,
    price_history: HashMap<AssetId, PriceSeries>,
}

pub fn run_estimate(args: EstimateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let raw = input::read_request(args.input.as_deref(), "estimate")?;
    let config = match args.config.as_deref() {
        Some(path) => input::file::read_config(path)?,
        None => EngineConfig::default(),
    };

    let stats = match estimate_request(raw, &config, args.days) {
        Ok(stats) => stats,
        Err(err) => {
            error!(kind = err.kind(), %err, "Estimation request failed");
            let failure = EngineResponse::Failure(ErrorResponse::from(&err));
            return Ok(serde_json::to_value(failure)?);
        }
    };

    let output = with_metadata(
        "Annualized mean and sample covariance of daily log-returns",
        &serde_json::json!({
            "trading_days_per_year": config.trading_days_per_year,
            "window_days": args.days,
        }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        stats,
    );
    Ok(serde_json::to_value(output)?)
}

/// Parse the request, apply the optional trailing window and estimate.
fn estimate_request(
    raw: Value,
    config: &EngineConfig,
    days: Option<u32>,
) -> EngineResult<MarketStatistics> {
    let request: EstimateRequest = serde_json::from_value(raw).map_err(EngineError::from)?;
    let history = match days {
        Some(days) => StaticPriceHistory::new(request.price_history).fetch(&request.assets, days)?,
        None => request.price_history,
    };
    estimate_annualized(&request.assets, &history, config.trading_days_per_year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failure_value(raw: Value, days: Option<u32>) -> Value {
        let err = estimate_request(raw, &EngineConfig::default(), days).unwrap_err();
        serde_json::to_value(EngineResponse::Failure(ErrorResponse::from(&err))).unwrap()
    }

    #[test]
    fn test_estimates_clean_history() {
        let raw = json!({
            "assets": "a, b",
            "price_history": { "a": [10.0, 11.0, 10.5, 12.0], "b": [5.0, 5.1, 4.9, 5.3] }
        });
        let stats = estimate_request(raw, &EngineConfig::default(), None).unwrap();
        assert_eq!(stats.num_assets(), 2);
    }

    #[test]
    fn test_zero_price_renders_error_object() {
        let raw = json!({
            "assets": ["a"],
            "price_history": { "a": [10.0, 0.0, 11.0] }
        });
        let value = failure_value(raw, None);
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "NonPositivePriceError");
        assert!(value["message"].as_str().unwrap().contains("observation 1"));
    }

    #[test]
    fn test_malformed_request_renders_serialization_error() {
        let value = failure_value(json!({ "assets": 7 }), None);
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "SerializationError");
    }

    #[test]
    fn test_unknown_asset_with_window_renders_error_object() {
        let raw = json!({
            "assets": ["a", "ghost"],
            "price_history": { "a": [10.0, 11.0, 12.0] }
        });
        let value = failure_value(raw, Some(2));
        assert_eq!(value["kind"], "InsufficientDataError");
    }
}
