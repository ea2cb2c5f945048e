// =============================================================================
// Stats Aggregator — day / week alert counters with period rollover
// =============================================================================
//
// Two windows share one shape.  Every cycle, before any alert is counted,
// each window compares its stored period key with the key of "now" and resets
// to zero on a mismatch.  Within a period the counters only grow.
//
// Period keys are exchange-local: "YYYY-MM-DD" and ISO week "YYYY-Www".
// =============================================================================

use chrono::{DateTime, Datelike, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::Tier;

/// Calendar-day key of `now` in its own timezone.
pub fn day_key<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y-%m-%d").to_string()
}

/// ISO-week key of `now` in its own timezone.
pub fn week_key<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    let week = now.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Alert counters for one calendar period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsWindow {
    #[serde(default)]
    pub period_key: String,
    #[serde(default)]
    pub agg_count: u32,
    #[serde(default)]
    pub safe_count: u32,
    #[serde(default)]
    pub confirmed_count: u32,
}

impl StatsWindow {
    /// Reset the counters if `key` names a different period.  Returns `true`
    /// when a reset happened.
    pub fn roll(&mut self, key: &str) -> bool {
        if self.period_key == key {
            return false;
        }
        *self = Self {
            period_key: key.to_string(),
            ..Self::default()
        };
        true
    }

    /// Count one delivered alert.
    pub fn record(&mut self, tier: Tier, confirmed: bool) {
        match tier {
            Tier::Aggressive => self.agg_count += 1,
            Tier::Safe => {
                self.safe_count += 1;
                if confirmed {
                    self.confirmed_count += 1;
                }
            }
        }
    }

    pub fn total(&self) -> u32 {
        self.agg_count + self.safe_count
    }

    /// Share of AGGRESSIVE alerts later confirmed by SAFE ones, in percent.
    pub fn confirmation_rate(&self) -> f64 {
        if self.agg_count == 0 {
            0.0
        } else {
            self.confirmed_count as f64 / self.agg_count as f64 * 100.0
        }
    }
}

/// The day and week windows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsBook {
    #[serde(default)]
    pub day: StatsWindow,
    #[serde(default)]
    pub week: StatsWindow,
    /// Windows closed by the last rollover, kept for reports whose trigger
    /// window runs past the period boundary.
    #[serde(default)]
    pub closed_day: StatsWindow,
    #[serde(default)]
    pub closed_week: StatsWindow,
}

impl StatsBook {
    /// Roll both windows to the periods containing `now`.
    pub fn roll<Tz: TimeZone>(&mut self, now: &DateTime<Tz>)
    where
        Tz::Offset: std::fmt::Display,
    {
        let day = day_key(now);
        let previous_day = self.day.clone();
        if self.day.roll(&day) {
            info!(old = %previous_day.period_key, new = %day, "day rolled — stats reset");
            self.closed_day = previous_day;
        }

        let week = week_key(now);
        let previous_week = self.week.clone();
        if self.week.roll(&week) {
            info!(old = %previous_week.period_key, new = %week, "week rolled — stats reset");
            self.closed_week = previous_week;
        }
    }

    /// Day counters for `key`: the open window or the one just closed.
    pub fn day_window(&self, key: &str) -> StatsWindow {
        pick_window(key, &self.day, &self.closed_day)
    }

    /// Week counters for `key`: the open window or the one just closed.
    pub fn week_window(&self, key: &str) -> StatsWindow {
        pick_window(key, &self.week, &self.closed_week)
    }

    pub fn record(&mut self, tier: Tier, confirmed: bool) {
        self.day.record(tier, confirmed);
        self.week.record(tier, confirmed);
    }
}

fn pick_window(key: &str, open: &StatsWindow, closed: &StatsWindow) -> StatsWindow {
    if closed.period_key == key {
        closed.clone()
    } else if open.period_key == key {
        open.clone()
    } else {
        StatsWindow {
            period_key: key.to_string(),
            ..StatsWindow::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Moscow;

    #[test]
    fn keys_are_exchange_local() {
        // 22:30 UTC on Sunday is 01:30 Monday in Moscow.
        let utc = chrono::Utc.with_ymd_and_hms(2024, 3, 10, 22, 30, 0).unwrap();
        let msk = utc.with_timezone(&Moscow);
        assert_eq!(day_key(&msk), "2024-03-11");
        assert_eq!(week_key(&msk), "2024-W11");
        assert_eq!(day_key(&utc), "2024-03-10");
        assert_eq!(week_key(&utc), "2024-W10");
    }

    #[test]
    fn day_window_resets_exactly_once_per_key_change() {
        let mut book = StatsBook::default();
        let d1 = Moscow.with_ymd_and_hms(2024, 3, 12, 10, 0, 0).unwrap();
        book.roll(&d1);
        book.record(Tier::Aggressive, false);
        book.record(Tier::Safe, true);

        // Several cycles inside the same day never reset.
        for minutes in [5, 10, 300, 600] {
            book.roll(&(d1 + chrono::Duration::minutes(minutes)));
            assert_eq!(book.day.agg_count, 1);
        }
        book.record(Tier::Aggressive, false);
        assert_eq!(book.day.agg_count, 2);

        let d2 = Moscow.with_ymd_and_hms(2024, 3, 13, 0, 1, 0).unwrap();
        book.roll(&d2);
        assert_eq!(book.day.period_key, "2024-03-13");
        assert_eq!(book.day.total(), 0);
        // Same ISO week: the week window keeps counting.
        assert_eq!(book.week.agg_count, 2);
        assert_eq!(book.week.confirmed_count, 1);

        book.record(Tier::Aggressive, false);
        book.roll(&(d2 + chrono::Duration::minutes(5)));
        assert_eq!(book.day.agg_count, 1);
    }

    #[test]
    fn week_window_resets_on_monday() {
        let mut book = StatsBook::default();
        let sunday = Moscow.with_ymd_and_hms(2024, 3, 17, 18, 0, 0).unwrap();
        book.roll(&sunday);
        book.record(Tier::Safe, false);
        let monday = Moscow.with_ymd_and_hms(2024, 3, 18, 9, 0, 0).unwrap();
        book.roll(&monday);
        assert_eq!(book.week.total(), 0);
        assert_eq!(book.week.period_key, "2024-W12");
    }

    #[test]
    fn closed_day_is_kept_for_late_reports() {
        let mut book = StatsBook::default();
        let evening = Moscow.with_ymd_and_hms(2024, 3, 12, 23, 50, 0).unwrap();
        book.roll(&evening);
        book.record(Tier::Aggressive, false);
        book.record(Tier::Aggressive, false);

        let after_midnight = Moscow.with_ymd_and_hms(2024, 3, 13, 0, 1, 0).unwrap();
        book.roll(&after_midnight);
        book.record(Tier::Safe, false);

        assert_eq!(book.day_window("2024-03-12").agg_count, 2);
        assert_eq!(book.day_window("2024-03-13").safe_count, 1);
        let unknown = book.day_window("2024-03-01");
        assert_eq!((unknown.period_key.as_str(), unknown.total()), ("2024-03-01", 0));
        assert_eq!(book.week_window("2024-W11").total(), 3);
    }

    #[test]
    fn confirmed_only_counts_for_safe() {
        let mut w = StatsWindow::default();
        w.record(Tier::Aggressive, true);
        w.record(Tier::Safe, true);
        w.record(Tier::Safe, false);
        assert_eq!((w.agg_count, w.safe_count, w.confirmed_count), (1, 2, 1));
    }

    #[test]
    fn confirmation_rate() {
        let w = StatsWindow {
            period_key: "2024-03-12".into(),
            agg_count: 8,
            safe_count: 4,
            confirmed_count: 3,
        };
        assert!((w.confirmation_rate() - 37.5).abs() < 1e-9);
        assert_eq!(StatsWindow::default().confirmation_rate(), 0.0);
    }
}
