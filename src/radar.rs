// =============================================================================
// Radar — the poll cycle
// =============================================================================
//
// One cycle:
//   1. Roll the day/week stats windows to "now"
//   2. Fetch bars and last prices for the index and the universe
//      (bounded fan-out, per-call timeout)
//   3. Index trend
//   4. Evaluate every symbol in universe order; failures skip the symbol
//   5. Gate -> notify -> record -> count, one symbol at a time
//   6. Daily / weekly reports
//   7. Persist the state atomically
//
// All state mutation happens on this task after the fan-out has completed.
// =============================================================================

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alert::Alert;
use crate::app_state::RadarState;
use crate::market_data::{Bar, MarketDataProvider, SeriesCache, SeriesKey};
use crate::notifier::{escape_html, MessageFormat, Notifier};
use crate::reports::{MarketOverview, Report, ReportKind};
use crate::runtime_config::RadarConfig;
use crate::signals::{confirmation_age, evaluate_symbol, AlertKey, DedupGate, GateVerdict, StageObservation};
use crate::stats::day_key;
use crate::trend::IndexTrend;
use crate::types::{Tier, Timeframe};

/// Bars kept per (symbol, timeframe).
const MAX_CACHED_BARS: usize = 1_000;

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub evaluated: usize,
    pub skipped: usize,
    pub delivered: usize,
    pub suppressed: usize,
    pub reports_sent: usize,
}

/// Everything fetched for one symbol this cycle.
struct Snapshot {
    symbol: String,
    series: Vec<(Timeframe, Vec<Bar>)>,
    last_price: Option<f64>,
}

pub struct Radar {
    config: RadarConfig,
    tz: Tz,
    provider: Arc<dyn MarketDataProvider>,
    notifier: Arc<dyn Notifier>,
    state: RadarState,
    state_path: PathBuf,
    cache: SeriesCache,
    gate: DedupGate,
}

impl Radar {
    /// Build the radar and load its persisted state.
    pub fn new(
        config: RadarConfig,
        provider: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let tz = config.tz()?;
        let state_path = PathBuf::from(&config.state_path);
        let state = RadarState::load(&state_path);
        let gate = DedupGate::from_minutes(config.cooldown_minutes);

        Ok(Self {
            config,
            tz,
            provider,
            notifier,
            state,
            state_path,
            cache: SeriesCache::new(MAX_CACHED_BARS),
            gate,
        })
    }

    // -------------------------------------------------------------------------
    // Loop
    // -------------------------------------------------------------------------

    /// Poll until Ctrl+C.  Cycle errors are reported and followed by the
    /// shorter error backoff; they never end the loop.
    pub async fn run_forever(mut self) -> Result<()> {
        self.send_banner_once(Utc::now()).await;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            let result = self.run_cycle(Utc::now()).await;
            let pause = self.handle_cycle_result(result).await;

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(pause)) => {}
                res = &mut shutdown => {
                    if let Err(e) = res {
                        warn!(error = %e, "ctrl-c listener failed");
                    }
                    warn!("shutdown signal received — stopping");
                    break;
                }
            }
        }

        info!("radar stopped");
        Ok(())
    }

    /// Report a failed cycle and pick the pause before the next one.
    async fn handle_cycle_result(&self, result: Result<CycleSummary>) -> u64 {
        match result {
            Ok(_) => self.config.poll_interval_secs,
            Err(e) => {
                error!(error = %format!("{e:#}"), "radar cycle failed");
                let text = format!("❌ <b>Radar error</b>\n{}", escape_html(&format!("{e:#}")));
                self.notifier.send(&text, MessageFormat::Html).await;
                self.config.error_backoff_secs
            }
        }
    }

    /// Announce start-up at most once per exchange-local day.
    pub async fn send_banner_once(&mut self, now: DateTime<Utc>) -> bool {
        let today = day_key(&now.with_timezone(&self.tz));
        if self.state.last_banner_date.as_deref() == Some(today.as_str()) {
            debug!(%today, "start-up banner already sent today");
            return false;
        }

        let priority = self.config.priority_symbols.join(", ");
        let text = format!(
            "🇷🇺 <b>MOEX radar started</b>\nSymbols: {}\nPriority: {}\nPoll: every {}s",
            self.config.universe().len(),
            escape_html(&priority),
            self.config.poll_interval_secs
        );
        self.notifier.send(&text, MessageFormat::Html).await;
        self.state.last_banner_date = Some(today);
        self.persist().await;
        true
    }

    // -------------------------------------------------------------------------
    // Cycle
    // -------------------------------------------------------------------------

    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleSummary> {
        let local = now.with_timezone(&self.tz);
        self.state.stats.roll(&local);

        let universe = self.config.universe();
        let prices = self.refresh_series(&universe).await;

        let index_price = prices.get(&self.config.index_symbol).copied().flatten();
        let index = IndexTrend::analyze(&self.cache, &self.config, index_price);

        let mut summary = CycleSummary::default();
        let mut observations = Vec::with_capacity(universe.len());

        for symbol in &universe {
            let last_price = prices.get(symbol).copied().flatten();
            let obs = match evaluate_symbol(&self.cache, &self.config, symbol, last_price, &index) {
                Ok(obs) => obs,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, transient = e.is_transient(), "symbol skipped");
                    summary.skipped += 1;
                    continue;
                }
            };
            summary.evaluated += 1;

            if let Some(tier) = obs.tier {
                if self.process_candidate(&obs, tier, &index, now).await {
                    summary.delivered += 1;
                } else {
                    summary.suppressed += 1;
                }
            }
            observations.push(obs);
        }

        summary.reports_sent = self.send_due_reports(now, &index, &observations).await;
        self.persist().await;

        info!(
            evaluated = summary.evaluated,
            skipped = summary.skipped,
            delivered = summary.delivered,
            suppressed = summary.suppressed,
            reports = summary.reports_sent,
            index_h1 = %index.h1,
            "cycle complete"
        );

        if summary.evaluated == 0 && summary.skipped > 0 {
            bail!("no market data for any of {} symbols", summary.skipped);
        }
        Ok(summary)
    }

    /// Fetch every series the cycle needs and load it into the cache.
    /// Returns the last price per symbol.
    async fn refresh_series(&self, universe: &[String]) -> HashMap<String, Option<f64>> {
        let mut symbols = vec![self.config.index_symbol.clone()];
        symbols.extend(universe.iter().filter(|s| **s != self.config.index_symbol).cloned());

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let jobs = symbols.into_iter().map(|symbol| {
            let timeframes: Vec<(Timeframe, u32)> = if symbol == self.config.index_symbol {
                vec![Timeframe::H1, Timeframe::D1, Timeframe::W1]
            } else {
                vec![Timeframe::H1, Timeframe::D1]
            }
            .into_iter()
            .map(|tf| (tf, self.config.history_days(tf)))
            .collect();
            fetch_snapshot(self.provider.clone(), symbol, timeframes, timeout)
        });

        let snapshots: Vec<Snapshot> = stream::iter(jobs)
            .buffer_unordered(self.config.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut prices = HashMap::with_capacity(snapshots.len());
        for snap in snapshots {
            for (timeframe, bars) in snap.series {
                let kept = self.cache.replace(SeriesKey::new(snap.symbol.as_str(), timeframe), bars);
                debug!(symbol = %snap.symbol, %timeframe, bars = kept, "series refreshed");
            }
            prices.insert(snap.symbol, snap.last_price);
        }
        prices
    }

    /// Run one tiered observation through the gate.  Returns `true` when an
    /// alert was delivered.
    async fn process_candidate(
        &mut self,
        obs: &StageObservation,
        tier: Tier,
        index: &IndexTrend,
        now: DateTime<Utc>,
    ) -> bool {
        let key = AlertKey {
            tier,
            stage: obs.stage,
            strength: obs.strength,
        };

        let verdict = self.gate.check(self.state.symbol(&obs.symbol), key, now);
        if verdict != GateVerdict::Deliver {
            debug!(symbol = %obs.symbol, %tier, stage = %obs.stage, strength = obs.strength, %verdict, "alert suppressed");
            return false;
        }

        let confirmation = match tier {
            Tier::Safe => confirmation_age(
                self.state.symbol(&obs.symbol),
                obs.direction,
                now,
                chrono::Duration::hours(self.config.confirm_window_hours),
            ),
            Tier::Aggressive => None,
        };

        let alert = Alert::new(tier, obs.clone(), index.h1, confirmation, now);
        info!(
            id = %alert.id,
            symbol = %obs.symbol,
            %tier,
            stage = %obs.stage,
            direction = %obs.direction,
            strength = obs.strength,
            confirmed = alert.is_confirmed(),
            created_at = %alert.created_at,
            "alert delivered"
        );
        self.notifier.send(&alert.render(), MessageFormat::Html).await;

        DedupGate::record(self.state.symbol_mut(&obs.symbol), key, obs.direction, now);
        self.state.stats.record(tier, alert.is_confirmed());
        true
    }

    async fn send_due_reports(
        &mut self,
        now: DateTime<Utc>,
        index: &IndexTrend,
        observations: &[StageObservation],
    ) -> usize {
        let local = now.with_timezone(&self.tz);
        let grace = self.config.report_grace_minutes;
        let mut due = Vec::new();

        if let Some(key) = self.state.reports.due_daily(&local, &self.config.daily_report, grace) {
            let stats = self.state.stats.day_window(&key);
            due.push((ReportKind::Daily, key, stats, index.d1));
        }
        if let Some(key) = self.state.reports.due_weekly(&local, &self.config.weekly_report, grace) {
            let stats = self.state.stats.week_window(&key);
            due.push((ReportKind::Weekly, key, stats, index.w1));
        }

        let sent = due.len();
        for (kind, key, stats, index_trend) in due {
            let report = Report {
                kind,
                period_key: key.clone(),
                stats,
                index_symbol: self.config.index_symbol.clone(),
                index_trend,
                overview: MarketOverview::from_observations(observations),
            };
            info!(
                %kind,
                period = %key,
                agg = report.stats.agg_count,
                safe = report.stats.safe_count,
                confirmed = report.stats.confirmed_count,
                quality = %report.quality(),
                "report sent"
            );
            self.notifier.send(&report.render(), MessageFormat::Html).await;
            self.state.reports.mark(kind, key);
        }
        sent
    }

    /// Save the state; a failure keeps the previous file and is retried by
    /// the next cycle's save.
    async fn persist(&self) {
        if let Err(e) = self.state.save(&self.state_path) {
            warn!(path = %self.state_path.display(), error = %e, "radar state not saved");
            let text = format!("⚠️ Radar state not saved: {e}");
            self.notifier.send(&text, MessageFormat::Plain).await;
        }
    }
}

async fn fetch_snapshot(
    provider: Arc<dyn MarketDataProvider>,
    symbol: String,
    timeframes: Vec<(Timeframe, u32)>,
    timeout: Duration,
) -> Snapshot {
    let mut series = Vec::with_capacity(timeframes.len());
    for (timeframe, days) in timeframes {
        let bars = match tokio::time::timeout(timeout, provider.get_bars(&symbol, timeframe, days)).await {
            Ok(bars) => bars,
            Err(_) => {
                warn!(symbol = %symbol, %timeframe, secs = timeout.as_secs(), "bar request timed out");
                Vec::new()
            }
        };
        series.push((timeframe, bars));
    }

    let last_price = match tokio::time::timeout(timeout, provider.get_last_price(&symbol)).await {
        Ok(price) => price,
        Err(_) => {
            warn!(symbol = %symbol, secs = timeout.as_secs(), "price request timed out");
            None
        }
    };

    Snapshot {
        symbol,
        series,
        last_price,
    }
}
