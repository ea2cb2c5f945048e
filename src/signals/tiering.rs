// =============================================================================
// Signal Tiering & Confirmation Linker
// =============================================================================
//
// AGGRESSIVE: impulse stage, volume multiple >= agg minimum, not overheated.
// SAFE:       AGGRESSIVE + H1/D1 agreement + index FLAT or aligned +
//             strength >= safe minimum.
//
// A SAFE alert is confirmed when the same symbol delivered an AGGRESSIVE
// alert in the same direction within the confirmation window.  The link is a
// backward lookup into the symbol's stored state; nothing is written on the
// AGGRESSIVE side.
// =============================================================================

use chrono::{DateTime, Duration, Utc};

use crate::app_state::SymbolState;
use crate::runtime_config::RadarConfig;
use crate::signals::strength::timeframes_agree;
use crate::types::{Stage, Tier, Trend};

#[derive(Debug, Clone, Copy)]
pub struct TierParams {
    pub agg_vol_mult_min: f64,
    pub safe_min_strength: u8,
    pub d1_confirm_pct: f64,
}

impl TierParams {
    pub fn from_config(config: &RadarConfig) -> Self {
        Self {
            agg_vol_mult_min: config.agg_vol_mult_min,
            safe_min_strength: config.safe_min_strength,
            d1_confirm_pct: config.d1_confirm_pct,
        }
    }
}

/// Observation fields that decide the tier.
#[derive(Debug, Clone, Copy)]
pub struct TierInputs {
    pub stage: Stage,
    pub overheat: bool,
    pub direction: Trend,
    pub volume_multiple: f64,
    pub h1_change_pct: f64,
    pub d1_change_pct: f64,
    pub index_trend: Trend,
    pub strength: u8,
}

/// Tier of an observation, or `None` when it does not qualify for an alert.
pub fn classify_tier(inputs: &TierInputs, params: &TierParams) -> Option<Tier> {
    let aggressive = !inputs.overheat
        && inputs.stage.is_impulse()
        && inputs.volume_multiple >= params.agg_vol_mult_min;
    if !aggressive {
        return None;
    }

    let index_ok = inputs.index_trend == Trend::Flat || inputs.index_trend == inputs.direction;
    let safe = index_ok
        && inputs.strength >= params.safe_min_strength
        && timeframes_agree(inputs.h1_change_pct, inputs.d1_change_pct, params.d1_confirm_pct);

    Some(if safe { Tier::Safe } else { Tier::Aggressive })
}

/// Age of the AGGRESSIVE alert that confirms a SAFE alert in `direction`,
/// or `None` when there is no such alert within `window`.
pub fn confirmation_age(
    state: Option<&SymbolState>,
    direction: Trend,
    now: DateTime<Utc>,
    window: Duration,
) -> Option<Duration> {
    let state = state?;
    let at = state.last_agg_at?;
    if state.last_agg_direction? != direction {
        return None;
    }
    let age = now - at;
    (age >= Duration::zero() && age <= window).then_some(age)
}
