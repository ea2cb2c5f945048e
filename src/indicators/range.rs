// =============================================================================
// Price range of a bar window
// =============================================================================
//
// Range width is normalised by price the same way band width is:
//   width = (high - low) / price * 100

use crate::market_data::Bar;

/// High/low envelope of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub high: f64,
    pub low: f64,
}

impl PriceRange {
    /// Envelope of `bars`; `None` for an empty window.
    pub fn of(bars: &[Bar]) -> Option<Self> {
        let first = bars.first()?;
        let init = Self {
            high: first.high,
            low: first.low,
        };
        Some(bars.iter().fold(init, |acc, b| Self {
            high: acc.high.max(b.high),
            low: acc.low.min(b.low),
        }))
    }

    /// Width relative to `price`, in percent.
    pub fn width_pct(&self, price: f64) -> Option<f64> {
        if price <= 0.0 {
            return None;
        }
        let w = (self.high - self.low) / price * 100.0;
        w.is_finite().then_some(w)
    }
}
