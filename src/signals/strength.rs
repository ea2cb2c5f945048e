// =============================================================================
// Strength Scorer — additive 1..=5 confidence score
// =============================================================================
//
//   breakout (either direction)                    +1
//   volume multiple >= each configured tier        +1 per tier
//   H1 and D1 agree in sign with |D1| > confirm    +1
//   index trend matches the symbol's H1 direction  +1
//   priority symbol                                +1
//
// The raw sum is clamped to [1, 5].  Overheat does not touch the number; it
// only removes tier eligibility.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::Trend;

pub const MIN_STRENGTH: u8 = 1;
pub const MAX_STRENGTH: u8 = 5;

/// Features the scorer looks at.
#[derive(Debug, Clone, Copy)]
pub struct StrengthInputs {
    pub breakout: Option<Trend>,
    pub volume_multiple: f64,
    pub h1_change_pct: f64,
    pub d1_change_pct: f64,
    pub index_trend: Trend,
    pub priority: bool,
}

/// Final score plus a human-readable trail of the rules that fired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrengthScore {
    pub raw: i32,
    pub value: u8,
    pub reasons: Vec<String>,
}

/// Clamp any raw score into the strength range.
pub fn clamp_strength(raw: i32) -> u8 {
    raw.clamp(MIN_STRENGTH as i32, MAX_STRENGTH as i32) as u8
}

/// H1 and D1 moves share a sign and the D1 move exceeds `d1_confirm_pct`.
pub fn timeframes_agree(h1_change_pct: f64, d1_change_pct: f64, d1_confirm_pct: f64) -> bool {
    let h1 = Trend::of_change(h1_change_pct);
    h1 != Trend::Flat && h1 == Trend::of_change(d1_change_pct) && d1_change_pct.abs() > d1_confirm_pct
}

pub fn score(inputs: &StrengthInputs, volume_tiers: &[f64], d1_confirm_pct: f64) -> StrengthScore {
    let mut raw = 0;
    let mut reasons = Vec::new();

    if let Some(dir) = inputs.breakout {
        raw += 1;
        reasons.push(format!("H1 range breakout {dir}"));
    }

    let tiers_hit = volume_tiers
        .iter()
        .filter(|t| inputs.volume_multiple >= **t)
        .count() as i32;
    if tiers_hit > 0 {
        raw += tiers_hit;
        reasons.push(format!("volume x{:.1}", inputs.volume_multiple));
    }

    if timeframes_agree(inputs.h1_change_pct, inputs.d1_change_pct, d1_confirm_pct) {
        raw += 1;
        reasons.push("H1 and D1 aligned".to_string());
    }

    let h1_dir = Trend::of_change(inputs.h1_change_pct);
    if inputs.index_trend != Trend::Flat && inputs.index_trend == h1_dir {
        raw += 1;
        reasons.push(format!("index trend {}", inputs.index_trend));
    }

    if inputs.priority {
        raw += 1;
        reasons.push("priority symbol".to_string());
    }

    StrengthScore {
        raw,
        value: clamp_strength(raw),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIERS: [f64; 3] = [1.5, 2.2, 3.0];

    fn base() -> StrengthInputs {
        StrengthInputs {
            breakout: None,
            volume_multiple: 1.0,
            h1_change_pct: 0.0,
            d1_change_pct: 0.0,
            index_trend: Trend::Flat,
            priority: false,
        }
    }

    #[test]
    fn clamp_covers_out_of_range_raw_scores() {
        for raw in -1..=10 {
            let v = clamp_strength(raw);
            assert!((MIN_STRENGTH..=MAX_STRENGTH).contains(&v), "raw {raw} -> {v}");
        }
        assert_eq!(clamp_strength(-1), 1);
        assert_eq!(clamp_strength(3), 3);
        assert_eq!(clamp_strength(10), 5);
    }

    #[test]
    fn nothing_fires_scores_minimum() {
        let s = score(&base(), &TIERS, 0.2);
        assert_eq!(s.raw, 0);
        assert_eq!(s.value, 1);
        assert!(s.reasons.is_empty());
    }

    #[test]
    fn breakout_plus_volume_scores_two() {
        let inputs = StrengthInputs {
            breakout: Some(Trend::Up),
            volume_multiple: 1.8,
            ..base()
        };
        let s = score(&inputs, &TIERS, 0.2);
        assert_eq!(s.raw, 2);
        assert_eq!(s.value, 2);
    }

    #[test]
    fn volume_tiers_are_cumulative() {
        let inputs = StrengthInputs {
            volume_multiple: 3.2,
            ..base()
        };
        assert_eq!(score(&inputs, &TIERS, 0.2).raw, 3);
    }

    #[test]
    fn every_rule_saturates_at_five() {
        let inputs = StrengthInputs {
            breakout: Some(Trend::Up),
            volume_multiple: 3.5,
            h1_change_pct: 0.8,
            d1_change_pct: 1.5,
            index_trend: Trend::Up,
            priority: true,
        };
        let s = score(&inputs, &TIERS, 0.2);
        assert_eq!(s.raw, 7);
        assert_eq!(s.value, 5);
        assert_eq!(s.reasons.len(), 5);
    }

    #[test]
    fn timeframe_agreement_needs_meaningful_d1_move() {
        assert!(timeframes_agree(0.5, 0.3, 0.2));
        assert!(!timeframes_agree(0.5, 0.2, 0.2));
        assert!(!timeframes_agree(0.5, -0.9, 0.2));
        assert!(timeframes_agree(-0.5, -0.9, 0.2));
        assert!(!timeframes_agree(0.0, 0.9, 0.2));
    }

    #[test]
    fn index_must_match_h1_direction() {
        let down_vs_up = StrengthInputs {
            h1_change_pct: 0.4,
            index_trend: Trend::Down,
            ..base()
        };
        assert_eq!(score(&down_vs_up, &TIERS, 0.2).raw, 0);

        let up_vs_up = StrengthInputs {
            h1_change_pct: 0.4,
            index_trend: Trend::Up,
            ..base()
        };
        assert_eq!(score(&up_vs_up, &TIERS, 0.2).raw, 1);
    }
}
