// =============================================================================
// Symbol Evaluator — series -> StageObservation
// =============================================================================
//
// Pipeline per symbol:
//   1. Pull the H1 and D1 windows from the series cache
//   2. Derive price, volume multiple, H1 and D1 changes
//   3. Stage classification (breakout / accumulation / overheat)
//   4. Strength score
//   5. Tier
// The result is ephemeral and produced at most once per symbol per cycle.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FetchError;
use crate::indicators::roc::{change_over, pct_change};
use crate::indicators::volume::volume_multiple;
use crate::market_data::{SeriesCache, SeriesKey};
use crate::runtime_config::RadarConfig;
use crate::signals::stage::{classify_stage, StageParams};
use crate::signals::strength::{score, StrengthInputs};
use crate::signals::tiering::{classify_tier, TierInputs, TierParams};
use crate::trend::IndexTrend;
use crate::types::{RelativeStrength, Stage, Tier, Timeframe, Trend};

/// Everything the radar concluded about one symbol this cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageObservation {
    pub symbol: String,
    pub price: f64,
    pub stage: Stage,
    pub direction: Trend,
    pub strength: u8,
    pub volume_multiple: f64,
    pub h1_change_pct: f64,
    pub d1_change_pct: f64,
    pub relative_strength: RelativeStrength,
    pub reasons: Vec<String>,
    pub tier: Option<Tier>,
    pub overheat: bool,
}

/// Evaluate `symbol` from the windows currently in `cache`.
///
/// `last_price` is the provider's live price; without it the close of the
/// forming H1 bar is used.
pub fn evaluate_symbol(
    cache: &SeriesCache,
    config: &RadarConfig,
    symbol: &str,
    last_price: Option<f64>,
    index: &IndexTrend,
) -> Result<StageObservation, FetchError> {
    let lookback = config.h1_lookback_bars;
    let h1 = cache.tail(&SeriesKey::new(symbol, Timeframe::H1), lookback + 1);
    if h1.len() < lookback + 1 {
        return Err(FetchError::Insufficient {
            symbol: symbol.to_string(),
            timeframe: Timeframe::H1,
            got: h1.len(),
            need: lookback + 1,
        });
    }

    let d1_closes = cache.closes(&SeriesKey::new(symbol, Timeframe::D1), usize::MAX);
    if d1_closes.len() < 2 {
        return Err(FetchError::Insufficient {
            symbol: symbol.to_string(),
            timeframe: Timeframe::D1,
            got: d1_closes.len(),
            need: 2,
        });
    }

    let (window, current) = h1.split_at(lookback);
    let current = current[0];
    let price = last_price.filter(|p| *p > 0.0).unwrap_or(current.close);

    let window_volumes: Vec<f64> = window.iter().map(|b| b.volume).collect();
    let vol_mult = volume_multiple(&window_volumes, current.volume).unwrap_or(0.0);

    let malformed = |what: &str| FetchError::Malformed {
        symbol: symbol.to_string(),
        detail: format!("cannot compute {what}"),
    };
    let prev_h1_close = window.last().map(|b| b.close).unwrap_or(current.open);
    let h1_change_pct = pct_change(prev_h1_close, price).ok_or_else(|| malformed("H1 change"))?;
    let d1_change_pct = change_over(&d1_closes, 1, price).ok_or_else(|| malformed("D1 change"))?;

    let reading = classify_stage(
        window,
        price,
        vol_mult,
        &d1_closes,
        &StageParams::from_config(config),
    )
    .ok_or_else(|| malformed("stage"))?;

    let direction = reading.breakout.unwrap_or_else(|| Trend::of_change(h1_change_pct));

    let strength = score(
        &StrengthInputs {
            breakout: reading.breakout,
            volume_multiple: vol_mult,
            h1_change_pct,
            d1_change_pct,
            index_trend: index.h1,
            priority: config.is_priority(symbol),
        },
        &config.volume_tiers,
        config.d1_confirm_pct,
    );

    let tier = classify_tier(
        &TierInputs {
            stage: reading.stage,
            overheat: reading.overheat,
            direction,
            volume_multiple: vol_mult,
            h1_change_pct,
            d1_change_pct,
            index_trend: index.h1,
            strength: strength.value,
        },
        &TierParams::from_config(config),
    );

    let mut reasons = strength.reasons;
    if let Some(m) = reading.d1_move_pct.filter(|_| reading.overheat) {
        reasons.push(format!("overheated: {m:+.1}% over {} D1 bars", config.overheat_bars));
    }
    if reading.stage == Stage::Accum {
        reasons.push(format!("range compressed to {:.2}%", reading.range_width_pct));
    }

    debug!(
        symbol,
        stage = %reading.stage,
        direction = %direction,
        strength = strength.value,
        raw = strength.raw,
        volume_multiple = format!("{vol_mult:.2}"),
        h1 = format!("{h1_change_pct:.2}"),
        d1 = format!("{d1_change_pct:.2}"),
        tier = ?tier,
        "symbol evaluated"
    );

    Ok(StageObservation {
        symbol: symbol.to_string(),
        price,
        stage: reading.stage,
        direction,
        strength: strength.value,
        volume_multiple: vol_mult,
        h1_change_pct,
        d1_change_pct,
        relative_strength: RelativeStrength::compare(d1_change_pct, index.d1_change_pct),
        reasons,
        tier,
        overheat: reading.overheat,
    })
}
