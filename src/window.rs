//! Trailing-window deltas of cumulative counters.
//!
//! A cumulative counter such as "restarts since the container was created"
//! is snapshotted on every invocation. The snapshots within the trailing
//! window are kept under one store key, and the increase between the oldest
//! surviving snapshot and the current value is reported as "events in the
//! last ~window". The effective window starts at the oldest surviving
//! snapshot, so on sparse schedules it is shorter than the nominal one.

use crate::store::{Sample, StoredValue, ValueStore};

/// Outcome of [`windowed_delta`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowDelta {
    /// Increase of the counter over `[since, now]`.
    Delta {
        /// Counter increase within the window
        delta: f64,
        /// Timestamp of the oldest snapshot the delta is measured from
        since: f64,
    },
    /// Fewer than two snapshots exist within the window.
    InsufficientHistory,
    /// The counter decreased (its source was reset); history restarts from
    /// the current snapshot and no delta is reported for this cycle.
    CounterReset,
}

impl WindowDelta {
    /// The delta, if one could be computed this cycle.
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Delta { delta, .. } => Some(delta),
            _ => None,
        }
    }
}

/// Record `current` under `key` and report its increase over the trailing
/// `cutoff_seconds`.
///
/// Snapshots older than `now - cutoff_seconds` are pruned before the
/// current one is appended, so a long gap between invocations resets the
/// history instead of comparing against stale data. Snapshots dated after
/// `now` (the clock went backwards) are pruned as well. A snapshot taken at
/// the same instant as the newest stored one replaces it.
///
/// A non-finite `now`, `cutoff_seconds` or `current` is not recorded and
/// yields [`WindowDelta::InsufficientHistory`]; the stored history is left
/// as it was.
pub fn windowed_delta(
    store: &mut dyn ValueStore,
    key: &str,
    now: f64,
    cutoff_seconds: f64,
    current: f64,
) -> WindowDelta {
    if !now.is_finite() || !cutoff_seconds.is_finite() || !current.is_finite() {
        log::debug!("{}: ignoring non-finite snapshot {} at {}", key, current, now);
        return WindowDelta::InsufficientHistory;
    }
    let cutoff = now - cutoff_seconds;
    let mut history: Vec<Sample> = match store.get(key).and_then(StoredValue::as_series) {
        Some(series) => series
            .iter()
            .copied()
            .filter(|s| s.timestamp >= cutoff && s.timestamp <= now)
            .collect(),
        None => {
            if store.get(key).is_some() {
                log::debug!("{}: discarding malformed window history", key);
            }
            Vec::new()
        }
    };
    history.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    if history.last().is_some_and(|s| s.timestamp == now) {
        history.pop();
    }

    let regressed = history.iter().any(|s| s.value > current);
    if regressed {
        log::debug!(
            "{}: counter went back to {}, restarting window history",
            key,
            current
        );
        history.clear();
    }

    history.push(Sample::new(now, current));
    let oldest = history[0];
    let len = history.len();
    store.set(key, history.into());

    if regressed {
        WindowDelta::CounterReset
    } else if len < 2 {
        WindowDelta::InsufficientHistory
    } else {
        WindowDelta::Delta {
            delta: current - oldest.value,
            since: oldest.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn history_len(store: &MemoryStore, key: &str) -> usize {
        store
            .get(key)
            .and_then(StoredValue::as_series)
            .map_or(0, <[Sample]>::len)
    }

    #[test]
    fn first_snapshot_has_no_result() {
        let mut store = MemoryStore::new();
        assert_eq!(
            windowed_delta(&mut store, "k", 0.0, 3600.0, 10.0),
            WindowDelta::InsufficientHistory
        );
        assert_eq!(history_len(&store, "k"), 1);
    }

    #[test]
    fn stale_snapshots_are_pruned_before_computing() {
        let mut store = MemoryStore::new();
        windowed_delta(&mut store, "k", 0.0, 3600.0, 10.0);
        windowed_delta(&mut store, "k", 1800.0, 3600.0, 15.0);
        let result = windowed_delta(&mut store, "k", 3700.0, 3600.0, 20.0);
        assert_eq!(
            result,
            WindowDelta::Delta {
                delta: 5.0,
                since: 1800.0
            }
        );
        assert_eq!(history_len(&store, "k"), 2);
    }

    #[test]
    fn unchanged_counter_reports_zero() {
        let mut store = MemoryStore::new();
        windowed_delta(&mut store, "k", 0.0, 3600.0, 5.0);
        assert_eq!(
            windowed_delta(&mut store, "k", 1800.0, 3600.0, 5.0).value(),
            Some(0.0)
        );
    }

    #[test]
    fn long_gap_resets_history() {
        let mut store = MemoryStore::new();
        windowed_delta(&mut store, "k", 0.0, 3600.0, 1.0);
        windowed_delta(&mut store, "k", 60.0, 3600.0, 2.0);
        assert_eq!(
            windowed_delta(&mut store, "k", 20_000.0, 3600.0, 9.0),
            WindowDelta::InsufficientHistory
        );
        assert_eq!(history_len(&store, "k"), 1);
    }

    #[test]
    fn repeated_calls_at_same_instant_do_not_grow_history() {
        let mut store = MemoryStore::new();
        windowed_delta(&mut store, "k", 0.0, 3600.0, 3.0);
        for _ in 0..50 {
            windowed_delta(&mut store, "k", 600.0, 3600.0, 4.0);
        }
        assert_eq!(history_len(&store, "k"), 2);
        assert_eq!(
            windowed_delta(&mut store, "k", 600.0, 3600.0, 4.0).value(),
            Some(1.0)
        );
    }

    #[test]
    fn history_is_bounded_by_window_over_interval() {
        let mut store = MemoryStore::new();
        for i in 0..200 {
            windowed_delta(&mut store, "k", f64::from(i) * 60.0, 3600.0, f64::from(i));
        }
        // one snapshot per minute over an hour, inclusive of both ends
        assert_eq!(history_len(&store, "k"), 61);
    }

    #[test]
    fn counter_regression_suppresses_one_cycle() {
        let mut store = MemoryStore::new();
        windowed_delta(&mut store, "k", 0.0, 3600.0, 40.0);
        windowed_delta(&mut store, "k", 600.0, 3600.0, 42.0);
        assert_eq!(
            windowed_delta(&mut store, "k", 1200.0, 3600.0, 1.0),
            WindowDelta::CounterReset
        );
        assert_eq!(history_len(&store, "k"), 1);
        assert_eq!(
            windowed_delta(&mut store, "k", 1800.0, 3600.0, 3.0).value(),
            Some(2.0)
        );
    }

    #[test]
    fn future_snapshots_are_dropped() {
        let mut store = MemoryStore::new();
        windowed_delta(&mut store, "k", 5000.0, 3600.0, 10.0);
        assert_eq!(
            windowed_delta(&mut store, "k", 1000.0, 3600.0, 12.0),
            WindowDelta::InsufficientHistory
        );
    }

    #[test]
    fn non_finite_snapshots_are_not_recorded() {
        let mut store = MemoryStore::new();
        windowed_delta(&mut store, "k", 0.0, 3600.0, 4.0);
        let before = store.get("k").cloned();
        assert_eq!(
            windowed_delta(&mut store, "k", 60.0, 3600.0, f64::NAN),
            WindowDelta::InsufficientHistory
        );
        assert_eq!(
            windowed_delta(&mut store, "k", f64::NAN, 3600.0, 5.0),
            WindowDelta::InsufficientHistory
        );
        assert_eq!(store.get("k").cloned(), before);
        assert_eq!(
            windowed_delta(&mut store, "k", 120.0, 3600.0, 6.0).value(),
            Some(2.0)
        );
    }

    #[test]
    fn malformed_history_is_reinitialized() {
        let mut store = MemoryStore::new();
        store.set("k", 17.0.into());
        assert_eq!(
            windowed_delta(&mut store, "k", 0.0, 3600.0, 1.0),
            WindowDelta::InsufficientHistory
        );
        assert_eq!(history_len(&store, "k"), 1);
    }
}
