// =============================================================================
// Error taxonomy
// =============================================================================
//
// Nothing here is fatal.  Fetch errors skip one symbol for one cycle,
// persistence errors leave the previous on-disk state authoritative, and
// notification errors never leave the notifier.  Anything else escaping a
// cycle is an `anyhow::Error` handled by the poll loop.
// =============================================================================

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Timeframe;

/// Data for one symbol could not be obtained or used this cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {symbol} failed: {source}")]
    Transport {
        symbol: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {symbol} timed out after {secs}s")]
    Timeout { symbol: String, secs: u64 },

    #[error("{symbol}: provider returned HTTP {status}")]
    Status { symbol: String, status: u16 },

    #[error("{symbol}: malformed response: {detail}")]
    Malformed { symbol: String, detail: String },

    #[error("{symbol}: insufficient {timeframe} data ({got} < {need})")]
    Insufficient {
        symbol: String,
        timeframe: Timeframe,
        got: usize,
        need: usize,
    },

    #[error("{symbol}: no last price available")]
    NoPrice { symbol: String },
}

impl FetchError {
    /// Transient errors are expected to clear on their own; the rest point at
    /// the shape of the data.  Both are handled the same way.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Status { .. } | Self::NoPrice { .. }
        )
    }
}

/// Radar state could not be written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialise radar state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A message could not be delivered.  Logged and dropped by the notifier.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notifier transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notifier rejected message: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}
