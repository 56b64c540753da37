use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::EngineError;
use crate::linalg::Matrix;
use crate::types::{AssetId, PriceSeries, TRADING_DAYS_PER_YEAR};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Annualized return statistics for an ordered set of assets. Index `i` of
/// every vector and matrix refers to `asset_ids[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStatistics {
    pub asset_ids: Vec<AssetId>,
    /// Annualized mean daily log-return per asset.
    pub expected_returns: Vec<f64>,
    /// Annualized sample covariance of daily log-returns (N x N, symmetric).
    pub covariance_matrix: Matrix,
    /// Aligned price observations per asset that the statistics came from.
    #[serde(default)]
    pub observations: usize,
}

impl MarketStatistics {
    pub fn num_assets(&self) -> usize {
        self.asset_ids.len()
    }

    /// Check that returns and covariance agree with the asset list.
    pub fn check_dimensions(&self) -> EngineResult<()> {
        let n = self.asset_ids.len();
        if self.expected_returns.len() != n {
            return Err(EngineError::InvalidInput {
                field: "expected_returns".into(),
                reason: format!(
                    "Expected {} returns but got {}",
                    n,
                    self.expected_returns.len()
                ),
            });
        }
        if self.covariance_matrix.len() != n {
            return Err(EngineError::InvalidInput {
                field: "covariance_matrix".into(),
                reason: format!(
                    "Expected {}x{} matrix but got {} rows",
                    n,
                    n,
                    self.covariance_matrix.len()
                ),
            });
        }
        for (i, row) in self.covariance_matrix.iter().enumerate() {
            if row.len() != n {
                return Err(EngineError::InvalidInput {
                    field: "covariance_matrix".into(),
                    reason: format!("Row {} has {} columns, expected {}", i, row.len(), n),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Estimate annualized expected returns and covariance from raw price
/// history, using 252 trading days per year.
pub fn estimate(
    assets: &[AssetId],
    price_history: &HashMap<AssetId, PriceSeries>,
) -> EngineResult<MarketStatistics> {
    estimate_annualized(assets, price_history, TRADING_DAYS_PER_YEAR)
}

/// Estimate statistics with an explicit annualization factor.
///
/// All series are aligned to the shortest one by keeping their most recent
/// observations. Daily log-returns `ln(p[t] / p[t-1])` are averaged and
/// scaled by `trading_days`; the covariance uses the sample (n - 1)
/// convention and is scaled the same way.
pub fn estimate_annualized(
    assets: &[AssetId],
    price_history: &HashMap<AssetId, PriceSeries>,
    trading_days: f64,
) -> EngineResult<MarketStatistics> {
    validate_assets(assets)?;

    let mut series: Vec<&PriceSeries> = Vec::with_capacity(assets.len());
    for asset in assets {
        let s = price_history
            .get(asset)
            .ok_or_else(|| EngineError::InsufficientData {
                asset: asset.clone(),
                reason: "No price history supplied".into(),
            })?;
        if s.is_empty() {
            return Err(EngineError::InsufficientData {
                asset: asset.clone(),
                reason: "Price history is empty".into(),
            });
        }
        series.push(s);
    }

    let (shortest, min_len) = series
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.len()))
        .min_by_key(|&(_, len)| len)
        .unwrap_or((0, 0));
    if min_len < 2 {
        return Err(EngineError::InsufficientData {
            asset: assets[shortest].clone(),
            reason: format!("At least 2 aligned prices required, got {min_len}"),
        });
    }

    let mut returns: Vec<Vec<f64>> = Vec::with_capacity(assets.len());
    for (asset, s) in assets.iter().zip(series.iter()) {
        let window: Vec<f64> = s.tail(min_len).iter().map(|p| p.price).collect();
        // Offset of the window within the caller's series.
        let skipped = s.len() - min_len;
        if let Some((offset, &price)) = window
            .iter()
            .enumerate()
            .find(|(_, p)| !(p.is_finite() && **p > 0.0))
        {
            return Err(EngineError::NonPositivePrice {
                asset: asset.clone(),
                index: skipped + offset,
                price,
            });
        }
        returns.push(log_returns(&window));
    }

    debug!(
        assets = assets.len(),
        observations = min_len,
        "Aligned price history"
    );

    let means: Vec<f64> = returns.iter().map(|r| mean(r)).collect();
    let expected_returns = means.iter().map(|m| m * trading_days).collect();
    let covariance_matrix = sample_covariance(&returns, &means)
        .into_iter()
        .map(|row| row.into_iter().map(|c| c * trading_days).collect())
        .collect();

    Ok(MarketStatistics {
        asset_ids: assets.to_vec(),
        expected_returns,
        covariance_matrix,
        observations: min_len,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_assets(assets: &[AssetId]) -> EngineResult<()> {
    if assets.is_empty() {
        return Err(EngineError::InvalidInput {
            field: "assets".into(),
            reason: "At least one asset required".into(),
        });
    }
    let mut seen = HashSet::with_capacity(assets.len());
    for asset in assets {
        if !seen.insert(asset.as_str()) {
            return Err(EngineError::InvalidInput {
                field: "assets".into(),
                reason: format!("Duplicate asset identifier '{asset}'"),
            });
        }
    }
    Ok(())
}

/// Daily log-returns of a strictly positive price window.
fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample covariance of equally long return series. With a single return
/// the divisor is clamped to 1, which yields zeros.
#[allow(clippy::needless_range_loop)]
fn sample_covariance(returns: &[Vec<f64>], means: &[f64]) -> Matrix {
    let n = returns.len();
    let t = returns.first().map_or(0, Vec::len);
    let divisor = t.saturating_sub(1).max(1) as f64;
    let mut cov = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in i..n {
            let sum: f64 = returns[i]
                .iter()
                .zip(returns[j].iter())
                .map(|(a, b)| (a - means[i]) * (b - means[j]))
                .sum();
            let c = sum / divisor;
            cov[i][j] = c;
            cov[j][i] = c;
        }
    }
    cov
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn history(entries: &[(&str, Vec<f64>)]) -> (Vec<AssetId>, HashMap<AssetId, PriceSeries>) {
        let assets = entries.iter().map(|(a, _)| a.to_string()).collect();
        let map = entries
            .iter()
            .map(|(a, p)| (a.to_string(), PriceSeries::from_prices(p.clone())))
            .collect();
        (assets, map)
    }

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{a} != {b}");
    }

    #[test]
    fn test_flat_prices_yield_zero_statistics() {
        let (assets, map) = history(&[("a", vec![100.0; 91]), ("b", vec![100.0; 91])]);
        let stats = estimate(&assets, &map).unwrap();
        assert_eq!(stats.expected_returns, vec![0.0, 0.0]);
        assert_eq!(stats.covariance_matrix, vec![vec![0.0, 0.0], vec![0.0, 0.0]]);
        assert_eq!(stats.observations, 91);
    }

    #[test]
    fn test_known_returns_and_covariance() {
        // Log-returns: a = [ln 1.1, ln 1.0] , b = [ln 0.9, ln 1.2]
        let (assets, map) = history(&[("a", vec![100.0, 110.0, 110.0]), ("b", vec![50.0, 45.0, 54.0])]);
        let stats = estimate(&assets, &map).unwrap();

        let ra = [1.1_f64.ln(), 0.0];
        let rb = [0.9_f64.ln(), 1.2_f64.ln()];
        let ma = (ra[0] + ra[1]) / 2.0;
        let mb = (rb[0] + rb[1]) / 2.0;
        assert_close(stats.expected_returns[0], ma * 252.0, 1e-12);
        assert_close(stats.expected_returns[1], mb * 252.0, 1e-12);

        // Sample covariance with n - 1 = 1.
        let cab = (ra[0] - ma) * (rb[0] - mb) + (ra[1] - ma) * (rb[1] - mb);
        let vaa = (ra[0] - ma).powi(2) + (ra[1] - ma).powi(2);
        assert_close(stats.covariance_matrix[0][1], cab * 252.0, 1e-12);
        assert_close(stats.covariance_matrix[0][0], vaa * 252.0, 1e-12);
    }

    #[test]
    fn test_covariance_symmetric_with_nonnegative_diagonal() {
        let (assets, map) = history(&[
            ("a", vec![10.0, 10.5, 9.8, 11.2, 11.0, 12.1]),
            ("b", vec![200.0, 190.0, 205.0, 199.0, 210.0, 208.0]),
            ("c", vec![1.0, 1.01, 1.02, 0.99, 1.0, 1.03]),
        ]);
        let stats = estimate(&assets, &map).unwrap();
        for i in 0..3 {
            assert!(stats.covariance_matrix[i][i] >= 0.0);
            for j in 0..3 {
                assert_eq!(stats.covariance_matrix[i][j], stats.covariance_matrix[j][i]);
            }
        }
    }

    #[test]
    fn test_truncates_to_most_recent_window() {
        // The leading 1.0 in `a` would be a huge return if it were kept.
        let (assets, map) = history(&[("a", vec![1.0, 100.0, 100.0, 100.0]), ("b", vec![5.0, 5.0, 5.0])]);
        let stats = estimate(&assets, &map).unwrap();
        assert_eq!(stats.observations, 3);
        assert_eq!(stats.expected_returns, vec![0.0, 0.0]);
    }

    #[test]
    fn test_single_asset_gives_one_by_one_matrix() {
        let (assets, map) = history(&[("btc", vec![100.0, 102.0, 101.0, 105.0])]);
        let stats = estimate(&assets, &map).unwrap();
        assert_eq!(stats.covariance_matrix.len(), 1);
        assert_eq!(stats.covariance_matrix[0].len(), 1);
        assert!(stats.covariance_matrix[0][0] > 0.0);
    }

    #[test]
    fn test_two_observations_give_zero_covariance() {
        let (assets, map) = history(&[("a", vec![100.0, 110.0]), ("b", vec![100.0, 90.0])]);
        let stats = estimate(&assets, &map).unwrap();
        assert_eq!(stats.covariance_matrix, vec![vec![0.0, 0.0], vec![0.0, 0.0]]);
        assert_close(stats.expected_returns[0], 1.1_f64.ln() * 252.0, 1e-12);
    }

    #[test]
    fn test_custom_annualization() {
        let (assets, map) = history(&[("a", vec![100.0, 110.0, 121.0])]);
        let stats = estimate_annualized(&assets, &map, 365.0).unwrap();
        assert_close(stats.expected_returns[0], 1.1_f64.ln() * 365.0, 1e-12);
    }

    #[test]
    fn test_zero_price_rejected() {
        let (assets, map) = history(&[("a", vec![100.0, 101.0, 102.0]), ("b", vec![100.0, 0.0, 99.0])]);
        match estimate(&assets, &map) {
            Err(EngineError::NonPositivePrice { asset, index, price }) => {
                assert_eq!(asset, "b");
                assert_eq!(index, 1);
                assert_eq!(price, 0.0);
            }
            other => panic!("expected NonPositivePrice, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_price_index_refers_to_full_series() {
        let (assets, map) = history(&[("a", vec![1.0, 1.0, 1.0, 0.0, 1.0]), ("b", vec![1.0, 2.0, 3.0])]);
        match estimate(&assets, &map) {
            Err(EngineError::NonPositivePrice { asset, index, .. }) => {
                assert_eq!(asset, "a");
                assert_eq!(index, 3);
            }
            other => panic!("expected NonPositivePrice, got {other:?}"),
        }
    }

    #[test]
    fn test_non_positive_price_outside_window_ignored() {
        let (assets, map) = history(&[("a", vec![-1.0, 100.0, 101.0]), ("b", vec![100.0, 99.0])]);
        assert!(estimate(&assets, &map).is_ok());
    }

    #[test]
    fn test_empty_series_rejected() {
        let (assets, map) = history(&[("a", vec![100.0, 101.0]), ("b", vec![])]);
        assert!(matches!(
            estimate(&assets, &map),
            Err(EngineError::InsufficientData { ref asset, .. }) if asset == "b"
        ));
    }

    #[test]
    fn test_single_observation_rejected() {
        let (assets, map) = history(&[("a", vec![100.0])]);
        assert!(matches!(
            estimate(&assets, &map),
            Err(EngineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_missing_asset_rejected() {
        let (_, map) = history(&[("a", vec![100.0, 101.0])]);
        let assets = vec!["a".to_string(), "ghost".to_string()];
        assert!(matches!(
            estimate(&assets, &map),
            Err(EngineError::InsufficientData { ref asset, .. }) if asset == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_and_empty_asset_lists_rejected() {
        let (_, map) = history(&[("a", vec![100.0, 101.0])]);
        let dup = vec!["a".to_string(), "a".to_string()];
        assert!(matches!(
            estimate(&dup, &map),
            Err(EngineError::InvalidInput { .. })
        ));
        assert!(matches!(
            estimate(&[], &map),
            Err(EngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_check_dimensions() {
        let stats = MarketStatistics {
            asset_ids: vec!["a".into(), "b".into()],
            expected_returns: vec![0.1],
            covariance_matrix: vec![vec![0.0; 2]; 2],
            observations: 0,
        };
        assert!(stats.check_dimensions().is_err());
    }
}
