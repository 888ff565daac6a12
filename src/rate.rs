//! Per-second rates of monotonically increasing counters.

use crate::store::{Sample, StoredValue, ValueStore};

/// Outcome of [`counter_rate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CounterRate {
    /// Average increase per second since the previous observation.
    PerSecond(f64),
    /// First observation under this key; nothing to compare against yet.
    Initialized,
    /// The previous observation is not older than this one.
    NoTimeElapsed,
    /// The counter decreased (wrapped or was reset).
    Wrapped,
    /// The observation or its timestamp is not a finite number.
    Invalid,
}

impl CounterRate {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::PerSecond(rate) => Some(rate),
            _ => None,
        }
    }
}

/// Compute the rate of `value` per second since the observation stored
/// under `key`, then store `(now, value)` as the new reference.
///
/// The reference is always replaced, so a wrap or clock anomaly costs one
/// cycle and the following invocation computes from the new baseline.
/// Non-finite observations are rejected and leave the reference untouched.
pub fn counter_rate(store: &mut dyn ValueStore, key: &str, now: f64, value: f64) -> CounterRate {
    if !now.is_finite() || !value.is_finite() {
        log::debug!("{}: ignoring non-finite counter {} at {}", key, value, now);
        return CounterRate::Invalid;
    }
    let last = store.get(key).and_then(StoredValue::as_sample);
    store.set(key, Sample::new(now, value).into());

    let Some(last) = last else {
        return CounterRate::Initialized;
    };
    let elapsed = now - last.timestamp;
    if elapsed <= 0.0 {
        return CounterRate::NoTimeElapsed;
    }
    if value < last.value {
        log::debug!("{}: counter wrapped from {} to {}", key, last.value, value);
        return CounterRate::Wrapped;
    }
    CounterRate::PerSecond((value - last.value) / elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn rate_needs_two_observations() {
        let mut store = MemoryStore::new();
        assert_eq!(counter_rate(&mut store, "if.in", 0.0, 1000.0), CounterRate::Initialized);
        assert_eq!(
            counter_rate(&mut store, "if.in", 10.0, 1500.0),
            CounterRate::PerSecond(50.0)
        );
        assert_eq!(
            counter_rate(&mut store, "if.in", 20.0, 1500.0).value(),
            Some(0.0)
        );
    }

    #[test]
    fn wrap_costs_one_cycle() {
        let mut store = MemoryStore::new();
        counter_rate(&mut store, "c", 0.0, 900.0);
        assert_eq!(counter_rate(&mut store, "c", 10.0, 100.0), CounterRate::Wrapped);
        assert_eq!(counter_rate(&mut store, "c", 20.0, 300.0).value(), Some(20.0));
    }

    #[test]
    fn non_finite_counter_keeps_the_reference() {
        let mut store = MemoryStore::new();
        counter_rate(&mut store, "c", 0.0, 100.0);
        assert_eq!(counter_rate(&mut store, "c", 10.0, f64::NAN), CounterRate::Invalid);
        assert_eq!(counter_rate(&mut store, "c", f64::INFINITY, 1.0), CounterRate::Invalid);
        assert_eq!(
            store.get("c").and_then(StoredValue::as_sample),
            Some(Sample::new(0.0, 100.0))
        );
        assert_eq!(counter_rate(&mut store, "c", 20.0, 300.0).value(), Some(10.0));
    }

    #[test]
    fn stalled_clock_reports_no_rate() {
        let mut store = MemoryStore::new();
        counter_rate(&mut store, "c", 10.0, 1.0);
        assert_eq!(counter_rate(&mut store, "c", 10.0, 5.0), CounterRate::NoTimeElapsed);
        assert_eq!(counter_rate(&mut store, "c", 5.0, 6.0), CounterRate::NoTimeElapsed);
    }
}
