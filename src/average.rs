//! Time-weighted moving average over irregular samples.
//!
//! Checks are not invoked at a fixed cadence, so the smoothing weight is
//! derived from the time elapsed since the previous sample rather than from
//! a sample count. The result is an exponential moving average whose time
//! constant equals the configured window.

use crate::store::{Sample, StoredValue, ValueStore};

/// Smooth `current_value` into the average kept under `key`.
///
/// - The first sample (or a malformed entry under `key`) is stored and
///   returned unchanged.
/// - If no time has passed since the last sample (`now <= last`), the stored
///   average is returned and the store is left untouched.
/// - Otherwise the average moves towards `current_value` by
///   `1 - exp(-elapsed / window)`, is stored together with `now`, and is
///   returned.
///
/// A non-positive `window_minutes` disables smoothing: the current value is
/// stored and returned.
///
/// A non-finite `now` or `current_value` is ignored like a stalled clock:
/// the stored average (or, without one, `current_value`) is returned and
/// nothing is written.
pub fn moving_average(
    store: &mut dyn ValueStore,
    key: &str,
    now: f64,
    current_value: f64,
    window_minutes: f64,
) -> f64 {
    let last = store.get(key).and_then(StoredValue::as_sample);
    if !now.is_finite() || !current_value.is_finite() {
        log::debug!("{}: ignoring non-finite sample {} at {}", key, current_value, now);
        return last.map_or(current_value, |s| s.value);
    }
    let Some(last) = last else {
        store.set(key, Sample::new(now, current_value).into());
        return current_value;
    };

    let elapsed = now - last.timestamp;
    if elapsed <= 0.0 || !elapsed.is_finite() {
        log::debug!(
            "{}: no time elapsed since {} (now {}), keeping average {}",
            key,
            last.timestamp,
            now,
            last.value
        );
        return last.value;
    }

    let weight = if window_minutes > 0.0 {
        1.0 - (-elapsed / (window_minutes * 60.0)).exp()
    } else {
        1.0
    };
    let average = last.value + weight * (current_value - last.value);
    store.set(key, Sample::new(now, average).into());
    average
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn first_sample_is_returned_verbatim() {
        let mut store = MemoryStore::new();
        assert_eq!(moving_average(&mut store, "avg", 100.0, 42.0, 5.0), 42.0);
        assert_eq!(
            store.get("avg").and_then(StoredValue::as_sample),
            Some(Sample::new(100.0, 42.0))
        );
    }

    #[test]
    fn identical_samples_return_the_value() {
        let mut store = MemoryStore::new();
        moving_average(&mut store, "avg", 100.0, 42.0, 5.0);
        assert_eq!(moving_average(&mut store, "avg", 100.0, 42.0, 5.0), 42.0);
    }

    #[test]
    fn weight_follows_elapsed_time() {
        let mut store = MemoryStore::new();
        moving_average(&mut store, "avg", 0.0, 0.0, 1.0);
        // one full time constant: weight = 1 - 1/e
        let avg = moving_average(&mut store, "avg", 60.0, 100.0, 1.0);
        let expected = 100.0 * (1.0 - (-1.0f64).exp());
        assert!((avg - expected).abs() < 1e-9);
    }

    #[test]
    fn spike_is_damped_more_when_sampling_often() {
        let mut frequent = MemoryStore::new();
        moving_average(&mut frequent, "avg", 0.0, 10.0, 15.0);
        let short = moving_average(&mut frequent, "avg", 10.0, 1000.0, 15.0);

        let mut sparse = MemoryStore::new();
        moving_average(&mut sparse, "avg", 0.0, 10.0, 15.0);
        let long = moving_average(&mut sparse, "avg", 3600.0, 1000.0, 15.0);

        assert!(short < long);
        assert!(short > 10.0 && long < 1000.0);
    }

    #[test]
    fn clock_going_backwards_freezes_the_average() {
        let mut store = MemoryStore::new();
        moving_average(&mut store, "avg", 100.0, 10.0, 5.0);
        moving_average(&mut store, "avg", 160.0, 20.0, 5.0);
        let before = store.get("avg").cloned();

        let frozen = moving_average(&mut store, "avg", 50.0, 500.0, 5.0);
        assert_eq!(Some(StoredValue::Sample(Sample::new(160.0, frozen))), before);
        assert_eq!(store.get("avg").cloned(), before);
    }

    #[test]
    fn non_finite_samples_leave_the_average_alone() {
        let mut store = MemoryStore::new();
        moving_average(&mut store, "avg", 0.0, 10.0, 5.0);
        assert_eq!(moving_average(&mut store, "avg", 60.0, f64::NAN, 5.0), 10.0);
        assert_eq!(moving_average(&mut store, "avg", f64::NAN, 30.0, 5.0), 10.0);
        assert_eq!(
            store.get("avg").and_then(StoredValue::as_sample),
            Some(Sample::new(0.0, 10.0))
        );
        let avg = moving_average(&mut store, "avg", 120.0, 20.0, 5.0);
        assert!(avg > 10.0 && avg < 20.0);

        let mut empty = MemoryStore::new();
        assert!(moving_average(&mut empty, "avg", 0.0, f64::INFINITY, 5.0).is_infinite());
        assert!(empty.is_empty());
    }

    #[test]
    fn malformed_entry_is_reinitialized() {
        let mut store = MemoryStore::new();
        store.set("avg", vec![Sample::new(1.0, 1.0)].into());
        assert_eq!(moving_average(&mut store, "avg", 10.0, 7.0, 5.0), 7.0);
        assert_eq!(
            store.get("avg").and_then(StoredValue::as_sample),
            Some(Sample::new(10.0, 7.0))
        );
    }

    #[test]
    fn non_positive_window_disables_smoothing() {
        let mut store = MemoryStore::new();
        moving_average(&mut store, "avg", 0.0, 10.0, 0.0);
        assert_eq!(moving_average(&mut store, "avg", 30.0, 90.0, 0.0), 90.0);
    }

    #[test]
    fn output_stays_within_observed_range() {
        let samples = [
            (0.0, 50.0),
            (7.0, 90.0),
            (8.0, 10.0),
            (400.0, 75.0),
            (401.5, 30.0),
            (9000.0, 60.0),
            (9010.0, 99.0),
        ];
        for window in [0.1, 1.0, 15.0, 240.0] {
            let mut store = MemoryStore::new();
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for (now, value) in samples {
                lo = lo.min(value);
                hi = hi.max(value);
                let avg = moving_average(&mut store, "avg", now, value, window);
                assert!(avg >= lo && avg <= hi, "{avg} outside [{lo}, {hi}]");
            }
        }
    }
}
