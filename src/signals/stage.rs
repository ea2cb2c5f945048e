// =============================================================================
// Stage Classifier
// =============================================================================
//
// Range/volume/breakout features over the trailing H1 window:
//
//   price > high * (1 + breakout)             => IMPULSE_UP
//   price < low  * (1 - breakout)             => IMPULSE_DOWN
//   width <= accum_range AND vol >= accum_vol => ACCUM
//   otherwise                                 => NEUTRAL
//
// Independently, an absolute D1 move of at least `overheat_pct` over
// `overheat_bars` bars overrides the stage with OVERHEAT.  The breakout that
// was detected underneath is kept for scoring.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::range::PriceRange;
use crate::indicators::roc::change_over;
use crate::market_data::Bar;
use crate::runtime_config::RadarConfig;
use crate::types::{Stage, Trend};

/// Thresholds used by [`classify_stage`], all percentages.
#[derive(Debug, Clone, Copy)]
pub struct StageParams {
    pub breakout_pct: f64,
    pub accum_range_pct: f64,
    pub accum_volume_mult: f64,
    pub overheat_pct: f64,
    pub overheat_bars: usize,
}

impl StageParams {
    pub fn from_config(config: &RadarConfig) -> Self {
        Self {
            breakout_pct: config.breakout_pct,
            accum_range_pct: config.accum_range_pct,
            accum_volume_mult: config.accum_volume_mult,
            overheat_pct: config.overheat_pct,
            overheat_bars: config.overheat_bars,
        }
    }
}

/// Outcome of stage classification for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReading {
    pub stage: Stage,
    /// Breakout direction, if price left the range.  Survives an overheat
    /// override.
    pub breakout: Option<Trend>,
    pub range_high: f64,
    pub range_low: f64,
    pub range_width_pct: f64,
    /// D1 move over the overheat look-back, when enough D1 bars exist.
    pub d1_move_pct: Option<f64>,
    pub overheat: bool,
}

/// Classify the stage of a symbol.
///
/// `window` holds the trailing completed H1 bars (not including the bar that
/// `price` belongs to).  Returns `None` for an empty window or non-positive
/// price.
pub fn classify_stage(
    window: &[Bar],
    price: f64,
    volume_multiple: f64,
    d1_closes: &[f64],
    params: &StageParams,
) -> Option<StageReading> {
    if price <= 0.0 || !price.is_finite() {
        return None;
    }
    let range = PriceRange::of(window)?;
    let range_width_pct = range.width_pct(price)?;
    let margin = params.breakout_pct / 100.0;

    let breakout = if price > range.high * (1.0 + margin) {
        Some(Trend::Up)
    } else if price < range.low * (1.0 - margin) {
        Some(Trend::Down)
    } else {
        None
    };

    let mut stage = match breakout {
        Some(Trend::Up) => Stage::ImpulseUp,
        Some(_) => Stage::ImpulseDown,
        None if range_width_pct <= params.accum_range_pct
            && volume_multiple >= params.accum_volume_mult =>
        {
            Stage::Accum
        }
        None => Stage::Neutral,
    };

    let d1_move_pct = change_over(d1_closes, params.overheat_bars, price);
    let overheat = d1_move_pct.is_some_and(|m| m.abs() >= params.overheat_pct);
    if overheat {
        stage = Stage::Overheat;
    }

    Some(StageReading {
        stage,
        breakout,
        range_high: range.high,
        range_low: range.low,
        range_width_pct,
        d1_move_pct,
        overheat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> StageParams {
        StageParams::from_config(&RadarConfig::default())
    }

    /// Window whose envelope is exactly [low, high].
    fn window(high: f64, low: f64) -> Vec<Bar> {
        (0..20)
            .map(|i| {
                let (h, l) = match i {
                    3 => (high, low + 1.0),
                    7 => (high - 1.0, low),
                    _ => (high - 1.0, low + 1.0),
                };
                Bar::new(i, l + 0.5, h, l, h - 0.5, 1_000.0)
            })
            .collect()
    }

    fn calm_d1() -> Vec<f64> {
        vec![100.0; 10]
    }

    #[test]
    fn breakout_above_range_is_impulse_up() {
        // high 100, breakout 0.35% => threshold 100.35
        let r = classify_stage(&window(100.0, 95.0), 100.4, 1.8, &calm_d1(), &params()).unwrap();
        assert_eq!(r.stage, Stage::ImpulseUp);
        assert_eq!(r.breakout, Some(Trend::Up));
        assert!(!r.overheat);
    }

    #[test]
    fn inside_margin_is_not_a_breakout() {
        let r = classify_stage(&window(100.0, 95.0), 100.3, 1.8, &calm_d1(), &params()).unwrap();
        assert_eq!(r.breakout, None);
        assert_eq!(r.stage, Stage::Neutral);
    }

    #[test]
    fn breakdown_below_range_is_impulse_down() {
        let r = classify_stage(&window(100.0, 95.0), 94.5, 1.0, &calm_d1(), &params()).unwrap();
        assert_eq!(r.stage, Stage::ImpulseDown);
        assert_eq!(r.breakout, Some(Trend::Down));
    }

    #[test]
    fn compressed_range_with_volume_is_accum() {
        // width (100.2 - 99.8) / 100 = 0.4% <= 0.6%
        let tight: Vec<Bar> = (0..20)
            .map(|i| Bar::new(i, 100.0, 100.2, 99.8, 100.0, 1_000.0))
            .collect();
        let r = classify_stage(&tight, 100.0, 1.4, &calm_d1(), &params()).unwrap();
        assert_eq!(r.stage, Stage::Accum);

        let r = classify_stage(&tight, 100.0, 1.1, &calm_d1(), &params()).unwrap();
        assert_eq!(r.stage, Stage::Neutral);
    }

    #[test]
    fn d1_overheat_overrides_but_keeps_breakout() {
        // 5 bars before the last D1 close is 92.0; 100.4 / 92 = +9.1%
        let d1 = vec![90.0, 92.0, 94.0, 96.0, 97.0, 98.0, 99.0];
        let r = classify_stage(&window(100.0, 95.0), 100.4, 1.8, &d1, &params()).unwrap();
        assert_eq!(r.stage, Stage::Overheat);
        assert!(r.overheat);
        assert_eq!(r.breakout, Some(Trend::Up));
    }

    #[test]
    fn short_d1_history_never_overheats() {
        let r = classify_stage(&window(100.0, 95.0), 100.4, 1.8, &[50.0, 60.0], &params()).unwrap();
        assert!(!r.overheat);
        assert_eq!(r.d1_move_pct, None);
    }

    #[test]
    fn empty_window_or_bad_price() {
        assert!(classify_stage(&[], 100.0, 1.0, &calm_d1(), &params()).is_none());
        assert!(classify_stage(&window(100.0, 95.0), 0.0, 1.0, &calm_d1(), &params()).is_none());
    }
}
