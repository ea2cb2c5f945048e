// =============================================================================
// Alert — auditable record of every delivered radar signal
// =============================================================================
//
// Built once the dedup gate lets a candidate through.  Carries its own id and
// creation time so a log line and the chat message can be matched up.
// =============================================================================

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::notifier::escape_html;
use crate::signals::StageObservation;
use crate::types::{Tier, Trend};

/// Strength at which an alert is flagged for immediate attention.
const PRIORITY_STRENGTH: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Conclusion {
    Priority,
    Watch,
}

impl std::fmt::Display for Conclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Priority => write!(f, "PRIORITY"),
            Self::Watch => write!(f, "WATCH"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// UUID v4.
    pub id: String,
    pub tier: Tier,
    pub observation: StageObservation,
    pub index_trend: Trend,
    /// Age of the AGGRESSIVE alert this SAFE alert continues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_after_minutes: Option<i64>,
    pub conclusion: Conclusion,
    /// RFC 3339.
    pub created_at: String,
}

impl Alert {
    pub fn new(
        tier: Tier,
        observation: StageObservation,
        index_trend: Trend,
        confirmation: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Self {
        let conclusion = if observation.strength >= PRIORITY_STRENGTH {
            Conclusion::Priority
        } else {
            Conclusion::Watch
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tier,
            observation,
            index_trend,
            confirmed_after_minutes: confirmation.map(|d| d.num_minutes()),
            conclusion,
            created_at: now.to_rfc3339(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed_after_minutes.is_some()
    }

    /// Telegram HTML body.
    pub fn render(&self) -> String {
        let o = &self.observation;
        let badge = match self.tier {
            Tier::Aggressive => "⚡ AGGRESSIVE",
            Tier::Safe => "🛡 SAFE",
        };

        let mut out = format!("{badge} · <b>{}</b>\n", escape_html(&o.symbol));
        out.push_str(&format!("{} · {}\n", o.stage.label(), o.direction));
        out.push_str(&format!("Price: {:.2}\n", o.price));
        out.push_str(&format!(
            "H1: {:+.2}% · D1: {:+.2}% · Vol x{:.2}\n",
            o.h1_change_pct, o.d1_change_pct, o.volume_multiple
        ));
        out.push_str(&format!("Strength: {} {}/5\n", strength_bar(o.strength), o.strength));
        out.push_str(&format!("Index: {} · {}\n", self.index_trend, o.relative_strength));

        if !o.reasons.is_empty() {
            out.push('\n');
            for reason in &o.reasons {
                out.push_str(&format!("• {}\n", escape_html(reason)));
            }
        }

        if let Some(minutes) = self.confirmed_after_minutes {
            out.push_str(&format!(
                "\n✅ Confirms AGGRESSIVE signal from {} ago\n",
                format_age(minutes)
            ));
        }

        out.push_str(&format!("\n<b>{}</b>", self.conclusion));
        out
    }
}

fn strength_bar(strength: u8) -> String {
    let filled = strength.min(5) as usize;
    format!("{}{}", "■".repeat(filled), "□".repeat(5 - filled))
}

fn format_age(minutes: i64) -> String {
    if minutes < 60 {
        format!("{minutes}m")
    } else {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RelativeStrength, Stage};

    fn observation(strength: u8) -> StageObservation {
        StageObservation {
            symbol: "SBER".into(),
            price: 301.25,
            stage: Stage::ImpulseUp,
            direction: Trend::Up,
            strength,
            volume_multiple: 2.4,
            h1_change_pct: 0.8,
            d1_change_pct: 1.6,
            relative_strength: RelativeStrength::AboveMarket,
            reasons: vec!["H1 range breakout UP".into(), "volume x2.4 <hot>".into()],
            tier: Some(Tier::Safe),
            overheat: false,
        }
    }

    #[test]
    fn conclusion_follows_strength() {
        let now = Utc::now();
        assert_eq!(
            Alert::new(Tier::Aggressive, observation(3), Trend::Flat, None, now).conclusion,
            Conclusion::Watch
        );
        assert_eq!(
            Alert::new(Tier::Safe, observation(4), Trend::Up, None, now).conclusion,
            Conclusion::Priority
        );
    }

    #[test]
    fn confirmed_safe_alert_renders_annotation() {
        let alert = Alert::new(
            Tier::Safe,
            observation(5),
            Trend::Up,
            Some(Duration::minutes(135)),
            Utc::now(),
        );
        assert!(alert.is_confirmed());
        let text = alert.render();
        assert!(text.contains("🛡 SAFE · <b>SBER</b>"));
        assert!(text.contains("2h 15m ago"));
        assert!(text.contains("■■■■■ 5/5"));
        assert!(text.contains("&lt;hot&gt;"));
        assert!(text.ends_with("<b>PRIORITY</b>"));
        assert_eq!(uuid::Uuid::parse_str(&alert.id).map(|u| u.get_version_num()).ok(), Some(4));
    }

    #[test]
    fn unconfirmed_alert_has_no_annotation() {
        let alert = Alert::new(Tier::Aggressive, observation(2), Trend::Flat, None, Utc::now());
        assert!(!alert.render().contains("Confirms"));
    }
}
