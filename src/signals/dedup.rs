// =============================================================================
// Dedup / Cooldown Gate
// =============================================================================
//
// Per-symbol state machine SILENT -> ALERTED(tier, stage, strength, ts).
// A candidate passes only if
//   (a) at least `cooldown` has elapsed since the last delivered alert, and
//   (b) its (tier, stage, strength) differs from the last delivered triple.
// =============================================================================

use chrono::{DateTime, Duration, Utc};

use crate::app_state::SymbolState;
use crate::types::{Stage, Tier, Trend};

/// The classification a candidate alert would be delivered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertKey {
    pub tier: Tier,
    pub stage: Stage,
    pub strength: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Deliver,
    Cooldown { remaining: Duration },
    Duplicate,
}

impl std::fmt::Display for GateVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deliver => write!(f, "deliver"),
            Self::Cooldown { remaining } => write!(f, "cooldown ({}m left)", remaining.num_minutes()),
            Self::Duplicate => write!(f, "duplicate"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DedupGate {
    cooldown: Duration,
}

impl DedupGate {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes))
    }

    pub fn check(&self, state: Option<&SymbolState>, key: AlertKey, now: DateTime<Utc>) -> GateVerdict {
        let Some(state) = state else {
            return GateVerdict::Deliver;
        };

        if let Some(sent_at) = state.last_sent_at {
            let elapsed = now - sent_at;
            if elapsed < self.cooldown {
                return GateVerdict::Cooldown {
                    remaining: self.cooldown - elapsed,
                };
            }
        }

        if state.last_key() == Some(key) {
            return GateVerdict::Duplicate;
        }

        GateVerdict::Deliver
    }

    /// Update `state` after an alert was handed to the notifier.
    pub fn record(state: &mut SymbolState, key: AlertKey, direction: Trend, now: DateTime<Utc>) {
        state.last_sent_at = Some(now);
        state.last_tier = Some(key.tier);
        state.last_stage = Some(key.stage);
        state.last_strength = Some(key.strength);
        if key.tier == Tier::Aggressive {
            state.last_agg_at = Some(now);
            state.last_agg_direction = Some(direction);
        }
    }
}
