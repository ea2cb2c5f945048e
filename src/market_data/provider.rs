// =============================================================================
// Market data provider seam
// =============================================================================

use async_trait::async_trait;

use crate::market_data::Bar;
use crate::types::Timeframe;

/// Source of bars and last prices.
///
/// Both calls fail soft: transport or parse problems surface as an empty
/// series or `None`, and the caller decides whether that is enough data.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Bars for `symbol` covering the last `lookback_days` calendar days,
    /// ordered oldest first.
    async fn get_bars(&self, symbol: &str, timeframe: Timeframe, lookback_days: u32) -> Vec<Bar>;

    /// Last traded price (or current value for an index).
    async fn get_last_price(&self, symbol: &str) -> Option<f64>;
}
