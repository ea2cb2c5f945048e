// =============================================================================
// Shared types used across the radar
// =============================================================================

use serde::{Deserialize, Serialize};

/// Bar timeframe requested from the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    H1,
    D1,
    W1,
}

impl Timeframe {
    /// MOEX ISS candle interval code.
    pub fn iss_interval(self) -> u32 {
        match self {
            Self::H1 => 60,
            Self::D1 => 24,
            Self::W1 => 7,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::H1 => write!(f, "H1"),
            Self::D1 => write!(f, "D1"),
            Self::W1 => write!(f, "W1"),
        }
    }
}

/// Qualitative direction of a series or a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    /// Direction of a signed percentage change.
    pub fn of_change(pct: f64) -> Self {
        if pct > 0.0 {
            Self::Up
        } else if pct < 0.0 {
            Self::Down
        } else {
            Self::Flat
        }
    }
}

impl Default for Trend {
    fn default() -> Self {
        Self::Flat
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
            Self::Flat => write!(f, "FLAT"),
        }
    }
}

/// Price-action stage of a single security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Compressed range with rising volume.
    Accum,
    ImpulseUp,
    ImpulseDown,
    /// Exhausted D1 move; blocks all alert tiers.
    Overheat,
    /// No breakout and no accumulation.
    Neutral,
}

impl Stage {
    pub fn is_impulse(self) -> bool {
        matches!(self, Self::ImpulseUp | Self::ImpulseDown)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Accum => "🟢 ACCUMULATION",
            Self::ImpulseUp => "🟡 IMPULSE UP",
            Self::ImpulseDown => "🔴 IMPULSE DOWN",
            Self::Overheat => "🔥 OVERHEAT",
            Self::Neutral => "⚪ NEUTRAL",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accum => write!(f, "ACCUM"),
            Self::ImpulseUp => write!(f, "IMPULSE_UP"),
            Self::ImpulseDown => write!(f, "IMPULSE_DOWN"),
            Self::Overheat => write!(f, "OVERHEAT"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Alert tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// Early, high-risk.
    Aggressive,
    /// Multi-timeframe and index confirmed, lower risk.
    Safe,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aggressive => write!(f, "AGGRESSIVE"),
            Self::Safe => write!(f, "SAFE"),
        }
    }
}

/// Symbol D1 move compared with the index D1 move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelativeStrength {
    AboveMarket,
    BelowMarket,
    InLine,
}

/// Differences smaller than this (percentage points) count as in line.
const RELATIVE_STRENGTH_BAND_PP: f64 = 0.05;

impl RelativeStrength {
    pub fn compare(symbol_change_pct: f64, index_change_pct: f64) -> Self {
        if index_change_pct == 0.0 {
            return Self::InLine;
        }
        let diff = symbol_change_pct - index_change_pct;
        if diff > RELATIVE_STRENGTH_BAND_PP {
            Self::AboveMarket
        } else if diff < -RELATIVE_STRENGTH_BAND_PP {
            Self::BelowMarket
        } else {
            Self::InLine
        }
    }
}

impl std::fmt::Display for RelativeStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AboveMarket => write!(f, "ABOVE MARKET"),
            Self::BelowMarket => write!(f, "BELOW MARKET"),
            Self::InLine => write!(f, "IN LINE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_of_change_sign() {
        assert_eq!(Trend::of_change(0.4), Trend::Up);
        assert_eq!(Trend::of_change(-0.1), Trend::Down);
        assert_eq!(Trend::of_change(0.0), Trend::Flat);
    }

    #[test]
    fn relative_strength_bands() {
        assert_eq!(RelativeStrength::compare(1.0, 0.5), RelativeStrength::AboveMarket);
        assert_eq!(RelativeStrength::compare(0.2, 0.5), RelativeStrength::BelowMarket);
        assert_eq!(RelativeStrength::compare(0.52, 0.5), RelativeStrength::InLine);
        assert_eq!(RelativeStrength::compare(3.0, 0.0), RelativeStrength::InLine);
    }

    #[test]
    fn only_impulses_are_impulses() {
        assert!(Stage::ImpulseUp.is_impulse());
        assert!(Stage::ImpulseDown.is_impulse());
        assert!(!Stage::Accum.is_impulse());
        assert!(!Stage::Overheat.is_impulse());
        assert!(!Stage::Neutral.is_impulse());
    }
}
