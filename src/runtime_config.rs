// =============================================================================
// Radar Configuration — every tunable threshold of the engine
// =============================================================================
//
// Thresholds that differed between historical deployments of the radar are
// configuration here, not behaviour.  All fields carry `#[serde(default)]` so
// that a partial JSON file only overrides what it names.
//
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::Timeframe;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    [
        "SBER", "GAZP", "LKOH", "ROSN", "GMKN", "NVTK", "TATN", "MTSS", "ALRS", "CHMF", "MAGN",
        "PLZL",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_priority_symbols() -> Vec<String> {
    vec!["SBER".to_string(), "GAZP".to_string(), "LKOH".to_string()]
}

fn default_index_symbol() -> String {
    "IMOEX".to_string()
}

fn default_timezone() -> String {
    "Europe/Moscow".to_string()
}

fn default_state_path() -> String {
    "radar_state.json".to_string()
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_error_backoff_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_h1_lookback_bars() -> usize {
    24
}

fn default_h1_history_days() -> u32 {
    7
}

fn default_d1_history_days() -> u32 {
    60
}

fn default_w1_history_days() -> u32 {
    365
}

fn default_ema_period() -> usize {
    20
}

fn default_breakout_pct() -> f64 {
    0.35
}

fn default_accum_range_pct() -> f64 {
    0.6
}

fn default_accum_volume_mult() -> f64 {
    1.3
}

fn default_overheat_pct() -> f64 {
    8.0
}

fn default_overheat_bars() -> usize {
    5
}

fn default_volume_tiers() -> Vec<f64> {
    vec![1.5, 2.2, 3.0]
}

fn default_d1_confirm_pct() -> f64 {
    0.2
}

fn default_agg_vol_mult_min() -> f64 {
    1.5
}

fn default_safe_min_strength() -> u8 {
    4
}

fn default_cooldown_minutes() -> i64 {
    90
}

fn default_confirm_window_hours() -> i64 {
    48
}

fn default_report_grace_minutes() -> u32 {
    5
}

// =============================================================================
// Nested sections
// =============================================================================

/// How the trend classifier builds its reference level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendBasis {
    /// Arithmetic mean of the last `ema_period` closes.
    Mean,
    /// Last value of an EMA over the closes.
    Ema,
}

impl Default for TrendBasis {
    fn default() -> Self {
        Self::Mean
    }
}

/// Per-timeframe tolerance band around the trend reference level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendEpsilon {
    #[serde(default = "TrendEpsilon::default_h1")]
    pub h1: f64,
    #[serde(default = "TrendEpsilon::default_d1")]
    pub d1: f64,
    #[serde(default = "TrendEpsilon::default_w1")]
    pub w1: f64,
}

impl TrendEpsilon {
    fn default_h1() -> f64 {
        0.01
    }

    fn default_d1() -> f64 {
        0.005
    }

    fn default_w1() -> f64 {
        0.01
    }

    pub fn for_timeframe(&self, timeframe: Timeframe) -> f64 {
        match timeframe {
            Timeframe::H1 => self.h1,
            Timeframe::D1 => self.d1,
            Timeframe::W1 => self.w1,
        }
    }
}

impl Default for TrendEpsilon {
    fn default() -> Self {
        Self {
            h1: Self::default_h1(),
            d1: Self::default_d1(),
            w1: Self::default_w1(),
        }
    }
}

/// Exchange-local wall-clock time of a daily report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTrigger {
    pub hour: u32,
    pub minute: u32,
}

impl Default for DailyTrigger {
    fn default() -> Self {
        Self { hour: 19, minute: 0 }
    }
}

/// Exchange-local weekday and wall-clock time of the weekly report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTrigger {
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
}

impl Default for WeeklyTrigger {
    fn default() -> Self {
        Self {
            weekday: Weekday::Mon,
            hour: 19,
            minute: 0,
        }
    }
}

// =============================================================================
// RadarConfig
// =============================================================================

/// Top-level configuration for the radar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarConfig {
    // --- Loop & I/O ---------------------------------------------------------

    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds to wait after a failed cycle.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Upper bound on any single provider call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Symbols fetched in parallel.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// IANA zone of the exchange; period keys and report triggers use it.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_state_path")]
    pub state_path: String,

    // --- Universe -----------------------------------------------------------

    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Symbols that earn a strength bonus; also part of the universe.
    #[serde(default = "default_priority_symbols")]
    pub priority_symbols: Vec<String>,

    /// Benchmark index used for the market trend.
    #[serde(default = "default_index_symbol")]
    pub index_symbol: String,

    // --- Series windows -----------------------------------------------------

    /// Completed H1 bars forming the breakout range.
    #[serde(default = "default_h1_lookback_bars")]
    pub h1_lookback_bars: usize,

    #[serde(default = "default_h1_history_days")]
    pub h1_history_days: u32,

    #[serde(default = "default_d1_history_days")]
    pub d1_history_days: u32,

    #[serde(default = "default_w1_history_days")]
    pub w1_history_days: u32,

    // --- Classifiers --------------------------------------------------------

    #[serde(default = "default_ema_period")]
    pub ema_period: usize,

    #[serde(default)]
    pub trend_basis: TrendBasis,

    #[serde(default)]
    pub trend_epsilon: TrendEpsilon,

    /// Breakout margin beyond the range, in percent.
    #[serde(default = "default_breakout_pct")]
    pub breakout_pct: f64,

    /// Maximum range width (percent of price) that counts as compressed.
    #[serde(default = "default_accum_range_pct")]
    pub accum_range_pct: f64,

    #[serde(default = "default_accum_volume_mult")]
    pub accum_volume_mult: f64,

    /// Absolute D1 move (percent) that marks a symbol as overheated.
    #[serde(default = "default_overheat_pct")]
    pub overheat_pct: f64,

    #[serde(default = "default_overheat_bars")]
    pub overheat_bars: usize,

    // --- Scoring & tiering --------------------------------------------------

    /// Volume-multiple thresholds, one strength point each.
    #[serde(default = "default_volume_tiers")]
    pub volume_tiers: Vec<f64>,

    /// Minimum |D1 change| (percent) for H1/D1 agreement to count.
    #[serde(default = "default_d1_confirm_pct")]
    pub d1_confirm_pct: f64,

    #[serde(default = "default_agg_vol_mult_min")]
    pub agg_vol_mult_min: f64,

    #[serde(default = "default_safe_min_strength")]
    pub safe_min_strength: u8,

    // --- Dedup & confirmation -----------------------------------------------

    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,

    #[serde(default = "default_confirm_window_hours")]
    pub confirm_window_hours: i64,

    // --- Reports ------------------------------------------------------------

    #[serde(default)]
    pub daily_report: DailyTrigger,

    #[serde(default)]
    pub weekly_report: WeeklyTrigger,

    /// Minutes after a trigger during which the report may still fire.
    #[serde(default = "default_report_grace_minutes")]
    pub report_grace_minutes: u32,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            fetch_concurrency: default_fetch_concurrency(),
            timezone: default_timezone(),
            state_path: default_state_path(),
            symbols: default_symbols(),
            priority_symbols: default_priority_symbols(),
            index_symbol: default_index_symbol(),
            h1_lookback_bars: default_h1_lookback_bars(),
            h1_history_days: default_h1_history_days(),
            d1_history_days: default_d1_history_days(),
            w1_history_days: default_w1_history_days(),
            ema_period: default_ema_period(),
            trend_basis: TrendBasis::default(),
            trend_epsilon: TrendEpsilon::default(),
            breakout_pct: default_breakout_pct(),
            accum_range_pct: default_accum_range_pct(),
            accum_volume_mult: default_accum_volume_mult(),
            overheat_pct: default_overheat_pct(),
            overheat_bars: default_overheat_bars(),
            volume_tiers: default_volume_tiers(),
            d1_confirm_pct: default_d1_confirm_pct(),
            agg_vol_mult_min: default_agg_vol_mult_min(),
            safe_min_strength: default_safe_min_strength(),
            cooldown_minutes: default_cooldown_minutes(),
            confirm_window_hours: default_confirm_window_hours(),
            daily_report: DailyTrigger::default(),
            weekly_report: WeeklyTrigger::default(),
            report_grace_minutes: default_report_grace_minutes(),
        }
    }
}

impl RadarConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read radar config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse radar config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            priority = ?config.priority_symbols,
            "radar config loaded"
        );

        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.universe().is_empty() {
            bail!("symbol universe is empty");
        }
        if self.index_symbol.trim().is_empty() {
            bail!("index_symbol must not be empty");
        }
        if self.poll_interval_secs == 0 || self.request_timeout_secs == 0 {
            bail!("poll_interval_secs and request_timeout_secs must be positive");
        }
        if self.fetch_concurrency == 0 {
            bail!("fetch_concurrency must be at least 1");
        }
        if self.ema_period == 0 || self.h1_lookback_bars == 0 || self.overheat_bars == 0 {
            bail!("ema_period, h1_lookback_bars and overheat_bars must be positive");
        }
        if self.breakout_pct < 0.0 || self.overheat_pct <= 0.0 || self.agg_vol_mult_min <= 0.0 {
            bail!("breakout_pct, overheat_pct and agg_vol_mult_min must be positive");
        }
        if !(1..=5).contains(&self.safe_min_strength) {
            bail!("safe_min_strength must be within 1..=5, got {}", self.safe_min_strength);
        }
        if self.cooldown_minutes < 0 || self.confirm_window_hours < 0 {
            bail!("cooldown_minutes and confirm_window_hours must not be negative");
        }
        if self.daily_report.hour > 23 || self.daily_report.minute > 59 {
            bail!("daily_report time out of range");
        }
        if self.weekly_report.hour > 23 || self.weekly_report.minute > 59 {
            bail!("weekly_report time out of range");
        }
        if self.report_grace_minutes == 0 || self.report_grace_minutes >= 24 * 60 {
            bail!("report_grace_minutes must be within 1..1440");
        }
        self.tz()?;
        Ok(())
    }

    /// Base symbols followed by priority symbols, first occurrence wins.
    pub fn universe(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.symbols.len() + self.priority_symbols.len());
        for sym in self.symbols.iter().chain(self.priority_symbols.iter()) {
            let sym = sym.trim().to_uppercase();
            if !sym.is_empty() && !out.contains(&sym) {
                out.push(sym);
            }
        }
        out
    }

    pub fn is_priority(&self, symbol: &str) -> bool {
        self.priority_symbols
            .iter()
            .any(|p| p.trim().eq_ignore_ascii_case(symbol))
    }

    /// Exchange timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("unknown timezone {:?}: {e}", self.timezone))
    }

    /// Calendar days of history requested for `timeframe`.
    pub fn history_days(&self, timeframe: Timeframe) -> u32 {
        match timeframe {
            Timeframe::H1 => self.h1_history_days,
            Timeframe::D1 => self.d1_history_days,
            Timeframe::W1 => self.w1_history_days,
        }
    }
}

/// Split a comma separated symbol list, trimming and upper-casing.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RadarConfig::default();
        assert_eq!(cfg.poll_interval_secs, 300);
        assert_eq!(cfg.error_backoff_secs, 60);
        assert_eq!(cfg.symbols.len(), 12);
        assert_eq!(cfg.index_symbol, "IMOEX");
        assert_eq!(cfg.ema_period, 20);
        assert_eq!(cfg.cooldown_minutes, 90);
        assert_eq!(cfg.confirm_window_hours, 48);
        assert_eq!(cfg.safe_min_strength, 4);
        assert_eq!(cfg.daily_report, DailyTrigger { hour: 19, minute: 0 });
        assert_eq!(cfg.weekly_report.weekday, Weekday::Mon);
        assert_eq!(cfg.trend_basis, TrendBasis::Mean);
        assert!((cfg.overheat_pct - 8.0).abs() < f64::EPSILON);
        assert!((cfg.trend_epsilon.d1 - 0.005).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbols": ["AFLT"], "cooldown_minutes": 30,
                        "weekly_report": { "weekday": "Fri", "hour": 18, "minute": 30 } }"#;
        let cfg: RadarConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols, vec!["AFLT"]);
        assert_eq!(cfg.cooldown_minutes, 30);
        assert_eq!(cfg.weekly_report.weekday, Weekday::Fri);
        assert_eq!(cfg.weekly_report.minute, 30);
        assert_eq!(cfg.h1_lookback_bars, 24);
    }

    #[test]
    fn universe_deduplicates_preserving_order() {
        let mut cfg = RadarConfig::default();
        cfg.symbols = vec!["SBER".into(), "gazp".into(), "SBER".into()];
        cfg.priority_symbols = vec!["LKOH".into(), "GAZP".into()];
        assert_eq!(cfg.universe(), vec!["SBER", "GAZP", "LKOH"]);
        assert!(cfg.is_priority("lkoh"));
        assert!(!cfg.is_priority("SBER"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = RadarConfig::default();
        cfg.timezone = "Mars/Olympus".into();
        assert!(cfg.validate().is_err());

        let mut cfg = RadarConfig::default();
        cfg.safe_min_strength = 6;
        assert!(cfg.validate().is_err());

        let mut cfg = RadarConfig::default();
        cfg.symbols.clear();
        cfg.priority_symbols.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_symbol_list_trims_and_uppercases() {
        assert_eq!(parse_symbol_list(" sber, ,Gazp "), vec!["SBER", "GAZP"]);
    }
}
