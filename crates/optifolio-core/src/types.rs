use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Trading days per year used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Annual risk-free rate used for the Sharpe ratio.
pub const RISK_FREE_RATE: f64 = 0.02;

/// Raw decision values strictly above this are treated as selected.
pub const SELECTION_THRESHOLD: f64 = 0.5;

/// Asset identifier, e.g. "bitcoin".
pub type AssetId = String;

// ---------------------------------------------------------------------------
// Price observations
// ---------------------------------------------------------------------------

/// A single price observation. The timestamp is informational only; series
/// are aligned by position, never by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawObservation")]
pub struct PricePoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub price: f64,
}

/// Accepted wire shapes for a price observation: a bare number,
/// a `[timestamp_ms, price]` chart pair, or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawObservation {
    Price(f64),
    Pair(f64, f64),
    Point {
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
        price: f64,
    },
}

impl From<RawObservation> for PricePoint {
    fn from(raw: RawObservation) -> Self {
        match raw {
            RawObservation::Price(price) => PricePoint {
                timestamp: None,
                price,
            },
            RawObservation::Pair(ms, price) => PricePoint {
                timestamp: DateTime::from_timestamp_millis(ms as i64),
                price,
            },
            RawObservation::Point { timestamp, price } => PricePoint { timestamp, price },
        }
    }
}

/// Chronologically ordered price observations for one asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries {
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn from_prices(prices: impl IntoIterator<Item = f64>) -> Self {
        PriceSeries {
            points: prices
                .into_iter()
                .map(|price| PricePoint {
                    timestamp: None,
                    price,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The most recent `n` observations (all of them if fewer exist).
    pub fn tail(&self, n: usize) -> &[PricePoint] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }
}

impl From<Vec<f64>> for PriceSeries {
    fn from(prices: Vec<f64>) -> Self {
        PriceSeries::from_prices(prices)
    }
}

/// Split a comma-separated asset list, trimming whitespace and dropping
/// empty entries: `"bitcoin, ethereum"` -> `["bitcoin", "ethereum"]`.
pub fn parse_asset_list(raw: &str) -> Vec<AssetId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AssetList {
    List(Vec<AssetId>),
    Csv(String),
}

/// Serde helper accepting either a JSON list of identifiers or a
/// comma-separated string.
pub fn deserialize_assets<'de, D>(deserializer: D) -> Result<Vec<AssetId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match AssetList::deserialize(deserializer)? {
        AssetList::List(list) => list,
        AssetList::Csv(raw) => parse_asset_list(&raw),
    })
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_price_point_accepts_bare_number() {
        let s: PriceSeries = serde_json::from_str("[100.0, 101.5, 99]").unwrap();
        assert_eq!(s.prices(), vec![100.0, 101.5, 99.0]);
        assert!(s.points.iter().all(|p| p.timestamp.is_none()));
    }

    #[test]
    fn test_price_point_accepts_chart_pair() {
        let s: PriceSeries =
            serde_json::from_str("[[1700000000000, 35000.5], [1700086400000, 35500.0]]").unwrap();
        assert_eq!(s.prices(), vec![35000.5, 35500.0]);
        let ts = s.points[0].timestamp.unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_price_point_accepts_object() {
        let s: PriceSeries = serde_json::from_str(
            r#"[{"timestamp": "2024-01-01T00:00:00Z", "price": 42.0}, {"price": 43.0}]"#,
        )
        .unwrap();
        assert_eq!(s.prices(), vec![42.0, 43.0]);
        assert!(s.points[0].timestamp.is_some());
        assert!(s.points[1].timestamp.is_none());
    }

    #[test]
    fn test_tail_keeps_most_recent() {
        let s = PriceSeries::from_prices([1.0, 2.0, 3.0, 4.0]);
        let tail: Vec<f64> = s.tail(2).iter().map(|p| p.price).collect();
        assert_eq!(tail, vec![3.0, 4.0]);
        assert_eq!(s.tail(10).len(), 4);
    }

    #[test]
    fn test_parse_asset_list() {
        assert_eq!(
            parse_asset_list(" bitcoin,ethereum ,, solana "),
            vec!["bitcoin".to_string(), "ethereum".into(), "solana".into()]
        );
        assert!(parse_asset_list("  ").is_empty());
    }

    #[test]
    fn test_metadata_precision_field() {
        let out = with_metadata("Test", &serde_json::json!({}), vec![], 0, 1.0_f64);
        assert_eq!(out.metadata.precision, "ieee754_f64");
    }
}
