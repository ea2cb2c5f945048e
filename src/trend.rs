// =============================================================================
// Trend Classification
// =============================================================================
//
// Compares the last close with a moving reference level over `ema_period`
// closes:
//
//   UP    if close > ref * (1 + eps)
//   DOWN  if close < ref * (1 - eps)
//   FLAT  otherwise, and whenever there is not enough data
//
// The benchmark index is classified on H1 (scoring), D1 (daily report) and
// W1 (weekly report).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::ema::{last_ema, trailing_mean};
use crate::indicators::roc::change_over;
use crate::market_data::{SeriesCache, SeriesKey};
use crate::runtime_config::{RadarConfig, TrendBasis};
use crate::types::{Timeframe, Trend};

/// Classify `closes`.  Never fails: short or degenerate input is FLAT.
pub fn classify_trend(closes: &[f64], period: usize, epsilon: f64, basis: TrendBasis) -> Trend {
    let Some(&last) = closes.last() else {
        return Trend::Flat;
    };

    let reference = match basis {
        TrendBasis::Mean => trailing_mean(closes, period),
        TrendBasis::Ema => {
            if closes.len() < period {
                None
            } else {
                last_ema(closes, period)
            }
        }
    };

    let Some(reference) = reference.filter(|r| *r > 0.0) else {
        return Trend::Flat;
    };

    if last > reference * (1.0 + epsilon) {
        Trend::Up
    } else if last < reference * (1.0 - epsilon) {
        Trend::Down
    } else {
        Trend::Flat
    }
}

/// Trend of the benchmark index for one cycle.  Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexTrend {
    pub h1: Trend,
    pub d1: Trend,
    pub w1: Trend,
    /// Index move versus the previous D1 close, percent.
    pub d1_change_pct: f64,
}

impl Default for IndexTrend {
    fn default() -> Self {
        Self {
            h1: Trend::Flat,
            d1: Trend::Flat,
            w1: Trend::Flat,
            d1_change_pct: 0.0,
        }
    }
}

impl IndexTrend {
    /// Build the index trend from whatever index series the cache holds.
    ///
    /// Missing series degrade to FLAT and a zero change.
    pub fn analyze(cache: &SeriesCache, config: &RadarConfig, last_price: Option<f64>) -> Self {
        let symbol = config.index_symbol.as_str();
        let trend_of = |timeframe: Timeframe| {
            let closes = cache.window(&SeriesKey::new(symbol, timeframe));
            let mut closes: Vec<f64> = closes.iter().map(|b| b.close).collect();
            // The live value refreshes the still-forming bar.
            if let (Some(price), Some(last)) = (last_price, closes.last_mut()) {
                *last = price;
            }
            classify_trend(
                &closes,
                config.ema_period,
                config.trend_epsilon.for_timeframe(timeframe),
                config.trend_basis,
            )
        };

        let d1_closes = cache.window(&SeriesKey::new(symbol, Timeframe::D1));
        let d1_closes: Vec<f64> = d1_closes.iter().map(|b| b.close).collect();
        let d1_change_pct = last_price
            .or_else(|| d1_closes.last().copied())
            .and_then(|price| change_over(&d1_closes, 1, price))
            .unwrap_or(0.0);

        let trend = Self {
            h1: trend_of(Timeframe::H1),
            d1: trend_of(Timeframe::D1),
            w1: trend_of(Timeframe::W1),
            d1_change_pct,
        };

        debug!(
            index = symbol,
            h1 = %trend.h1,
            d1 = %trend.d1,
            w1 = %trend.w1,
            d1_change_pct = format!("{:.2}", trend.d1_change_pct),
            "index trend"
        );

        trend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Bar;

    fn flat_then(last: f64) -> Vec<f64> {
        let mut v = vec![100.0; 19];
        v.push(last);
        v
    }

    #[test]
    fn up_down_flat_around_mean() {
        // mean of [100 x19, 110] = 100.5; 110 > 100.5 * 1.01
        assert_eq!(classify_trend(&flat_then(110.0), 20, 0.01, TrendBasis::Mean), Trend::Up);
        assert_eq!(classify_trend(&flat_then(90.0), 20, 0.01, TrendBasis::Mean), Trend::Down);
        assert_eq!(classify_trend(&flat_then(100.5), 20, 0.01, TrendBasis::Mean), Trend::Flat);
    }

    #[test]
    fn epsilon_band_is_exclusive() {
        // mean = 100.05; upper bound 101.0505 with eps 1%
        assert_eq!(classify_trend(&flat_then(101.0), 20, 0.01, TrendBasis::Mean), Trend::Flat);
        assert_eq!(classify_trend(&flat_then(101.0), 20, 0.005, TrendBasis::Mean), Trend::Up);
    }

    #[test]
    fn insufficient_data_is_flat() {
        assert_eq!(classify_trend(&[100.0, 120.0], 20, 0.01, TrendBasis::Mean), Trend::Flat);
        assert_eq!(classify_trend(&[], 20, 0.01, TrendBasis::Ema), Trend::Flat);
        assert_eq!(classify_trend(&[100.0, 120.0], 20, 0.01, TrendBasis::Ema), Trend::Flat);
    }

    #[test]
    fn ema_basis_follows_rising_series() {
        let closes: Vec<f64> = (1..=60).map(|i| 100.0 + i as f64).collect();
        assert_eq!(classify_trend(&closes, 20, 0.01, TrendBasis::Ema), Trend::Up);
    }

    #[test]
    fn index_trend_from_cache() {
        let cfg = RadarConfig::default();
        let cache = SeriesCache::new(500);
        let rising: Vec<Bar> = (0..30)
            .map(|i| {
                let c = 3000.0 + 10.0 * i as f64;
                Bar::new(i, c, c + 5.0, c - 5.0, c, 1_000.0)
            })
            .collect();
        cache.replace(SeriesKey::new("IMOEX", Timeframe::D1), rising);

        let trend = IndexTrend::analyze(&cache, &cfg, None);
        assert_eq!(trend.d1, Trend::Up);
        assert_eq!(trend.h1, Trend::Flat);
        assert_eq!(trend.w1, Trend::Flat);
        // 3290 vs 3280
        assert!((trend.d1_change_pct - (10.0 / 3280.0 * 100.0)).abs() < 1e-9);
    }
}
