// =============================================================================
// Report Scheduler — daily / weekly summaries
// =============================================================================
//
// A report is due when the exchange-local time of day sits inside
// [trigger, trigger + grace) and the stored marker differs from the current
// period key.  The weekly report is additionally gated on the weekday.
// Marking stores the period key, so any number of polls inside the trigger
// window produce one report per period.
// =============================================================================

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::notifier::escape_html;
use crate::runtime_config::{DailyTrigger, WeeklyTrigger};
use crate::signals::StageObservation;
use crate::stats::{day_key, week_key, StatsWindow};
use crate::types::{Stage, Trend};

/// Number of symbols listed in the report's strength leaderboard.
const TOP_N: usize = 3;

/// Periods for which a report was already sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMarker {
    #[serde(default)]
    pub last_daily_key: Option<String>,
    #[serde(default)]
    pub last_weekly_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Daily,
    Weekly,
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
        }
    }
}

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Start of the `[hour:minute, hour:minute + grace)` local window holding
/// `now`, if any.  A window may run past midnight; the start then lies on the
/// previous day.
pub fn trigger_window_start<Tz: TimeZone>(
    now: &DateTime<Tz>,
    hour: u32,
    minute: u32,
    grace_minutes: u32,
) -> Option<DateTime<Tz>> {
    let now_min = now.hour() * 60 + now.minute();
    let trigger = hour * 60 + minute;
    let since = (now_min + MINUTES_PER_DAY - trigger) % MINUTES_PER_DAY;
    (since < grace_minutes.max(1)).then(|| now.clone() - Duration::minutes(i64::from(since)))
}

impl ReportMarker {
    /// Day key to report for, if the daily report is due at `now`.
    pub fn due_daily<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        trigger: &DailyTrigger,
        grace_minutes: u32,
    ) -> Option<String>
    where
        Tz::Offset: std::fmt::Display,
    {
        let start = trigger_window_start(now, trigger.hour, trigger.minute, grace_minutes)?;
        let key = day_key(&start);
        (self.last_daily_key.as_deref() != Some(key.as_str())).then_some(key)
    }

    /// Week key to report for, if the weekly report is due at `now`.
    pub fn due_weekly<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        trigger: &WeeklyTrigger,
        grace_minutes: u32,
    ) -> Option<String> {
        let start = trigger_window_start(now, trigger.hour, trigger.minute, grace_minutes)?;
        if start.weekday() != trigger.weekday {
            return None;
        }
        let key = week_key(&start);
        (self.last_weekly_key.as_deref() != Some(key.as_str())).then_some(key)
    }

    pub fn mark(&mut self, kind: ReportKind, key: String) {
        match kind {
            ReportKind::Daily => self.last_daily_key = Some(key),
            ReportKind::Weekly => self.last_weekly_key = Some(key),
        }
    }
}

// =============================================================================
// Content
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportQuality {
    Quiet,
    Good,
    Fair,
    Weak,
}

impl ReportQuality {
    pub fn assess(stats: &StatsWindow) -> Self {
        if stats.agg_count == 0 {
            return Self::Quiet;
        }
        let rate = stats.confirmation_rate();
        if stats.agg_count >= 6 && rate >= 25.0 {
            Self::Good
        } else if rate >= 15.0 {
            Self::Fair
        } else {
            Self::Weak
        }
    }
}

impl std::fmt::Display for ReportQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quiet => write!(f, "QUIET"),
            Self::Good => write!(f, "GOOD"),
            Self::Fair => write!(f, "FAIR"),
            Self::Weak => write!(f, "WEAK"),
        }
    }
}

/// Symbols per stage and the strongest names from the latest cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketOverview {
    pub stage_counts: Vec<(Stage, usize)>,
    pub top: Vec<(String, u8, Stage)>,
}

impl MarketOverview {
    pub fn from_observations(observations: &[StageObservation]) -> Self {
        let order = [
            Stage::ImpulseUp,
            Stage::ImpulseDown,
            Stage::Accum,
            Stage::Overheat,
            Stage::Neutral,
        ];
        let stage_counts = order
            .iter()
            .map(|s| (*s, observations.iter().filter(|o| o.stage == *s).count()))
            .filter(|(_, n)| *n > 0)
            .collect();

        let mut ranked: Vec<&StageObservation> = observations.iter().collect();
        // Stable sort keeps universe order among equal strengths.
        ranked.sort_by(|a, b| b.strength.cmp(&a.strength));
        let top = ranked
            .into_iter()
            .take(TOP_N)
            .map(|o| (o.symbol.clone(), o.strength, o.stage))
            .collect();

        Self { stage_counts, top }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub kind: ReportKind,
    pub period_key: String,
    pub stats: StatsWindow,
    pub index_symbol: String,
    pub index_trend: Trend,
    pub overview: MarketOverview,
}

impl Report {
    pub fn quality(&self) -> ReportQuality {
        ReportQuality::assess(&self.stats)
    }

    /// Telegram HTML body.
    pub fn render(&self) -> String {
        let title = match self.kind {
            ReportKind::Daily => "📊 <b>Daily radar report</b>",
            ReportKind::Weekly => "📅 <b>Weekly radar report</b>",
        };
        let trend_tf = match self.kind {
            ReportKind::Daily => "D1",
            ReportKind::Weekly => "W1",
        };

        let mut out = format!("{title} · {}\n\n", escape_html(&self.period_key));
        out.push_str(&format!("🔔 Alerts: {}\n", self.stats.total()));
        out.push_str(&format!("⚡ Aggressive: {}\n", self.stats.agg_count));
        out.push_str(&format!("🛡 Safe: {}\n", self.stats.safe_count));
        out.push_str(&format!(
            "✅ Confirmed: {} ({:.1}%)\n",
            self.stats.confirmed_count,
            self.stats.confirmation_rate()
        ));
        out.push_str(&format!("Quality: <b>{}</b>\n", self.quality()));
        out.push_str(&format!(
            "\n{} {trend_tf} trend: <b>{}</b>\n",
            escape_html(&self.index_symbol),
            self.index_trend
        ));

        if !self.overview.stage_counts.is_empty() {
            out.push_str("\n<b>Stages</b>\n");
            for (stage, n) in &self.overview.stage_counts {
                out.push_str(&format!("{}: {n}\n", stage.label()));
            }
        }
        if !self.overview.top.is_empty() {
            out.push_str("\n<b>Strongest</b>\n");
            for (i, (symbol, strength, stage)) in self.overview.top.iter().enumerate() {
                out.push_str(&format!(
                    "{}. {} {strength}/5 {stage}\n",
                    i + 1,
                    escape_html(symbol)
                ));
            }
        }
        out
    }
}
