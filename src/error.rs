//! Error types for checkstate.
//!
//! Only the harness-facing parts of the crate return errors: loading and
//! saving a [`FileStore`](crate::store::FileStore) and resolving raw check
//! parameters into typed level specifications. The evaluation core itself
//! (averages, windows, rates, levels) always produces a result.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while reading or writing persisted check state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The state file or its directory could not be accessed.
    #[error("cannot access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The in-memory state could not be encoded.
    #[error("cannot encode check state: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Invalid check configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Percentage levels were tagged with something other than `"perc"`.
    #[error("unknown level type {0:?} (expected \"perc\")")]
    UnknownLevelType(String),
    /// A threshold is not a finite number.
    #[error("threshold {0} is not a finite number")]
    NonFiniteThreshold(f64),
    /// A status ordering did not name every status exactly once.
    #[error("status ordering must name each of OK, WARN, CRIT, UNKNOWN exactly once")]
    InvalidStatusOrder,
    /// The parameter document could not be decoded.
    #[error("malformed check parameters: {0}")]
    Params(#[from] serde_json::Error),
}
