use std::collections::HashMap;

use crate::error::EngineError;
use crate::types::{AssetId, PriceSeries};
use crate::EngineResult;

/// Trailing window, in days, requested from a price-history source.
pub const DEFAULT_HISTORY_DAYS: u32 = 90;

/// A source of daily price history keyed by asset identifier.
///
/// Live market-data clients implement this outside the engine; the engine
/// itself only ever consumes the returned series.
pub trait PriceHistorySource {
    /// Price history for each of `asset_ids` over the trailing `days`.
    fn fetch(&self, asset_ids: &[AssetId], days: u32)
        -> EngineResult<HashMap<AssetId, PriceSeries>>;
}

/// Serves already-fetched series from memory.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceHistory {
    series: HashMap<AssetId, PriceSeries>,
}

impl StaticPriceHistory {
    pub fn new(series: HashMap<AssetId, PriceSeries>) -> Self {
        StaticPriceHistory { series }
    }

    pub fn insert(&mut self, asset: impl Into<AssetId>, series: PriceSeries) {
        self.series.insert(asset.into(), series);
    }
}

impl PriceHistorySource for StaticPriceHistory {
    /// Daily series are truncated to their last `days + 1` observations
    /// (`days` returns).
    fn fetch(
        &self,
        asset_ids: &[AssetId],
        days: u32,
    ) -> EngineResult<HashMap<AssetId, PriceSeries>> {
        let keep = days as usize + 1;
        asset_ids
            .iter()
            .map(|asset| {
                let series = self
                    .series
                    .get(asset)
                    .ok_or_else(|| EngineError::InsufficientData {
                        asset: asset.clone(),
                        reason: "Unknown asset identifier".into(),
                    })?;
                let window = PriceSeries {
                    points: series.tail(keep).to_vec(),
                };
                Ok((asset.clone(), window))
            })
            .collect()
    }
}
