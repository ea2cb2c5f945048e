// =============================================================================
// Radar State — the one persisted record
// =============================================================================
//
// Loaded once at start, mutated in place by the cycle, written back after the
// cycle's mutations are complete.  Persistence uses an atomic tmp + rename so
// a crash mid-write leaves the previous file intact.
//
// Load policy:
//   - missing file  -> fresh default state
//   - corrupt file  -> warn, fresh default state
// =============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::reports::ReportMarker;
use crate::signals::AlertKey;
use crate::stats::StatsBook;
use crate::types::{Stage, Tier, Trend};

/// Per-symbol memory of the last delivered alert.
///
/// A symbol with `last_sent_at == None` is SILENT; otherwise it is ALERTED
/// with the stored tier, stage and strength.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolState {
    #[serde(default)]
    pub last_sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_tier: Option<Tier>,
    #[serde(default)]
    pub last_stage: Option<Stage>,
    #[serde(default)]
    pub last_strength: Option<u8>,
    /// Only AGGRESSIVE deliveries touch these two.
    #[serde(default)]
    pub last_agg_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_agg_direction: Option<Trend>,
}

impl SymbolState {
    /// The (tier, stage, strength) triple of the last delivered alert.
    pub fn last_key(&self) -> Option<AlertKey> {
        Some(AlertKey {
            tier: self.last_tier?,
            stage: self.last_stage?,
            strength: self.last_strength?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadarState {
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolState>,
    #[serde(default)]
    pub stats: StatsBook,
    #[serde(default)]
    pub reports: ReportMarker,
    /// Exchange-local day the start-up banner was last sent.
    #[serde(default)]
    pub last_banner_date: Option<String>,
}

impl RadarState {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no radar state on disk — starting fresh");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "radar state unreadable — starting fresh");
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(state) => {
                info!(
                    path = %path.display(),
                    symbols = state.symbols.len(),
                    day = %state.stats.day.period_key,
                    week = %state.stats.week.period_key,
                    "radar state loaded"
                );
                state
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "radar state corrupt — starting fresh");
                Self::default()
            }
        }
    }

    /// Write the state to `path` atomically (write `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content).map_err(|source| PersistenceError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "radar state saved");
        Ok(())
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolState> {
        self.symbols.get(symbol)
    }

    pub fn symbol_mut(&mut self, symbol: &str) -> &mut SymbolState {
        self.symbols.entry(symbol.to_string()).or_default()
    }
}
