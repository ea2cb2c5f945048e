use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Timeframe;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar as returned by the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time, epoch milliseconds.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Prices are finite and positive, volume is finite and non-negative,
    /// and the high/low envelope is consistent.
    fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
            && self.high >= self.low
    }
}

/// Composite key that identifies a unique bar series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe)
    }
}

// ---------------------------------------------------------------------------
// SeriesCache -- trailing window per (symbol, timeframe)
// ---------------------------------------------------------------------------

/// Thread-safe store of the latest trailing bar window per
/// `(symbol, timeframe)`.
///
/// The provider may reorder or backfill bars between polls, so a window is
/// never appended to: every poll replaces it wholesale with the normalised
/// provider response.
pub struct SeriesCache {
    windows: RwLock<HashMap<SeriesKey, Vec<Bar>>>,
    max_bars: usize,
}

impl SeriesCache {
    /// Create a cache that keeps at most `max_bars` trailing bars per key.
    pub fn new(max_bars: usize) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            max_bars,
        }
    }

    /// Replace the window for `key` with `bars`.
    ///
    /// Insane bars are dropped, the rest are ordered by open time, duplicate
    /// open times keep the last occurrence, and the oldest bars are trimmed to
    /// `max_bars`.  Returns the length of the stored window.
    pub fn replace(&self, key: SeriesKey, bars: Vec<Bar>) -> usize {
        let received = bars.len();
        let window = normalize(bars, self.max_bars);
        let stored = window.len();

        if stored < received {
            debug!(key = %key, received, stored, "series normalised");
        }

        self.windows.write().insert(key, window);
        stored
    }

    /// Return the most recent `count` bars (oldest-first order).
    pub fn tail(&self, key: &SeriesKey, count: usize) -> Vec<Bar> {
        let map = self.windows.read();
        match map.get(key) {
            Some(window) => {
                let start = window.len().saturating_sub(count);
                window[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// The whole stored window (oldest-first order).
    pub fn window(&self, key: &SeriesKey) -> Vec<Bar> {
        self.tail(key, usize::MAX)
    }

    /// Close prices of the most recent `count` bars (oldest-first order).
    pub fn closes(&self, key: &SeriesKey, count: usize) -> Vec<f64> {
        self.tail(key, count).iter().map(|b| b.close).collect()
    }
}

fn normalize(mut bars: Vec<Bar>, max_bars: usize) -> Vec<Bar> {
    bars.retain(Bar::is_sane);
    // Stable sort keeps provider order among equal open times, so the
    // dedup below can keep the later (revised) bar.
    bars.sort_by_key(|b| b.open_time);

    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.open_time == bar.open_time => *last = bar,
            _ => out.push(bar),
        }
    }

    let excess = out.len().saturating_sub(max_bars);
    out.drain(..excess);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open_time: i64, close: f64) -> Bar {
        Bar::new(open_time, close, close + 1.0, close - 1.0, close, 100.0)
    }

    fn key(sym: &str) -> SeriesKey {
        SeriesKey::new(sym, Timeframe::H1)
    }

    #[test]
    fn window_trimming() {
        let cache = SeriesCache::new(3);
        let k = key("SBER");
        let bars = (0..5).map(|i| bar(i * 3_600_000, 100.0 + i as f64)).collect();

        assert_eq!(cache.replace(k.clone(), bars), 3);
        assert_eq!(cache.closes(&k, 10), vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn reordered_input_is_sorted() {
        let cache = SeriesCache::new(10);
        let k = key("GAZP");
        cache.replace(k.clone(), vec![bar(2, 12.0), bar(0, 10.0), bar(1, 11.0)]);
        assert_eq!(cache.closes(&k, 10), vec![10.0, 11.0, 12.0]);
        assert_eq!(cache.closes(&k, 1), vec![12.0]);
    }

    #[test]
    fn duplicate_open_time_keeps_later_revision() {
        let cache = SeriesCache::new(10);
        let k = key("LKOH");
        cache.replace(k.clone(), vec![bar(0, 10.0), bar(1, 11.0), bar(1, 11.5)]);
        assert_eq!(cache.closes(&k, 10), vec![10.0, 11.5]);
    }

    #[test]
    fn replace_is_wholesale() {
        let cache = SeriesCache::new(10);
        let k = key("ROSN");
        cache.replace(k.clone(), vec![bar(0, 10.0), bar(1, 11.0), bar(2, 12.0)]);
        cache.replace(k.clone(), vec![bar(5, 20.0)]);
        assert_eq!(cache.closes(&k, 10), vec![20.0]);
    }

    #[test]
    fn insane_bars_are_dropped() {
        let cache = SeriesCache::new(10);
        let k = key("MTSS");
        let mut broken = bar(1, 11.0);
        broken.close = f64::NAN;
        let mut inverted = bar(2, 12.0);
        inverted.high = 1.0;
        assert_eq!(cache.replace(k.clone(), vec![bar(0, 10.0), broken, inverted]), 1);
        assert_eq!(cache.window(&k).len(), 1);
    }

    #[test]
    fn missing_key_is_empty() {
        let cache = SeriesCache::new(10);
        let k = key("XXXX");
        assert!(cache.window(&k).is_empty());
        assert!(cache.closes(&k, 1).is_empty());
    }
}
