//! Persistent per-object check state.
//!
//! Every monitored object (one host + service pair) owns exactly one
//! [`ValueStore`]. The evaluation functions in this crate receive the store
//! as an explicit argument and keep their own entries under caller-chosen
//! keys such as `"mem.used.total"` or `"restart_count_list"`. The store does
//! not enforce namespacing, never expires entries and never clears anything
//! on read.
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`]: a plain ordered map, used by tests and embedders that
//!   persist state themselves.
//! - [`FileStore`]: a [`MemoryStore`] loaded from and saved to a JSON file
//!   at `<state_dir>/<host>/<service>.json`.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One `(timestamp, value)` observation.
///
/// Timestamps are seconds since the epoch and always supplied by the
/// caller, never captured from the system clock.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Observation time in seconds since the epoch
    pub timestamp: f64,
    /// Observed (or derived) value
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A value kept in a [`ValueStore`].
///
/// The JSON representation is untagged so state files stay readable:
/// numbers are plain numbers, samples are `{"timestamp": .., "value": ..}`
/// objects and series are arrays of samples.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum StoredValue {
    /// A bare number or timestamp
    Number(f64),
    /// A single timestamped observation
    Sample(Sample),
    /// An ordered history of observations
    Series(Vec<Sample>),
}

impl StoredValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_sample(&self) -> Option<Sample> {
        match self {
            Self::Sample(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[Sample]> {
        match self {
            Self::Series(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Sample> for StoredValue {
    fn from(value: Sample) -> Self {
        Self::Sample(value)
    }
}

impl From<Vec<Sample>> for StoredValue {
    fn from(value: Vec<Sample>) -> Self {
        Self::Series(value)
    }
}

/// Key/value state scoped to one monitored object.
///
/// Exactly one check invocation accesses a store at a time, so
/// implementations need no locking.
pub trait ValueStore {
    /// Look up the entry stored under `key`.
    fn get(&self, key: &str) -> Option<&StoredValue>;

    /// Insert or replace the entry under `key`.
    fn set(&mut self, key: &str, value: StoredValue);

    /// Remove the entry under `key`, returning it if present.
    fn remove(&mut self, key: &str) -> Option<StoredValue>;

    /// Look up `key`, falling back to `default` when it is absent.
    fn get_or(&self, key: &str, default: StoredValue) -> StoredValue {
        self.get(key).cloned().unwrap_or(default)
    }
}

/// In-memory [`ValueStore`] backed by an ordered map.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct MemoryStore {
    entries: BTreeMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl FromIterator<(String, StoredValue)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (String, StoredValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl ValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<&StoredValue> {
        self.entries.get(key)
    }

    fn set(&mut self, key: &str, value: StoredValue) {
        self.entries.insert(key.to_owned(), value);
    }

    fn remove(&mut self, key: &str) -> Option<StoredValue> {
        self.entries.remove(key)
    }
}

/// [`ValueStore`] persisted as a JSON document on disk.
///
/// Changes are only written by [`FileStore::save`]; the harness calls it
/// once at the end of an invocation so the next invocation sees the last
/// write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Load the store at `path`.
    ///
    /// A missing file yields an empty store. Entries are decoded one by
    /// one: an entry with an unrecognised shape (for example one written by
    /// an incompatible version) is dropped on its own and every other entry
    /// is kept. A file that is not a JSON object at all yields an empty
    /// store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let inner = match fs::read_to_string(&path) {
            Ok(raw) => decode_entries(&path, &raw),
            Err(err) if err.kind() == ErrorKind::NotFound => MemoryStore::default(),
            Err(err) => return Err(StoreError::io(path, err)),
        };
        Ok(Self { path, inner })
    }

    /// Load the store belonging to `service` on `host` below `state_dir`.
    pub fn scoped(state_dir: &Path, host: &str, service: &str) -> Result<Self, StoreError> {
        Self::open(scoped_path(state_dir, host, service))
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only view of the loaded entries.
    pub fn entries(&self) -> &MemoryStore {
        &self.inner
    }

    /// Write the store back to disk.
    ///
    /// The document is written to a sibling temporary file first and then
    /// renamed over the target, so readers never observe a partial file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let encoded = serde_json::to_string_pretty(&self.inner)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, encoded).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        log::debug!(
            "saved {} state entries to {}",
            self.inner.len(),
            self.path.display()
        );
        Ok(())
    }
}

impl ValueStore for FileStore {
    fn get(&self, key: &str) -> Option<&StoredValue> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: StoredValue) {
        self.inner.set(key, value);
    }

    fn remove(&mut self, key: &str) -> Option<StoredValue> {
        self.inner.remove(key)
    }
}

/// Decode a state document entry by entry.
fn decode_entries(path: &Path, raw: &str) -> MemoryStore {
    let document: BTreeMap<String, serde_json::Value> = match serde_json::from_str(raw) {
        Ok(document) => document,
        Err(err) => {
            log::warn!(
                "discarding unreadable state file {}: {}",
                path.display(),
                err
            );
            return MemoryStore::default();
        }
    };
    document
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value(value) {
            Ok(value) => Some((key, value)),
            Err(err) => {
                log::debug!("{}: dropping malformed entry {:?}: {}", path.display(), key, err);
                None
            }
        })
        .collect()
}

/// Path of the state file for `service` on `host`.
pub fn scoped_path(state_dir: &Path, host: &str, service: &str) -> PathBuf {
    state_dir
        .join(sanitize_component(host))
        .join(format!("{}.json", sanitize_component(service)))
}

/// Make a host or service name safe to use as a single path component.
fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".into()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_falls_back_on_empty_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get_or("missing", 4.0.into()), StoredValue::Number(4.0));
        assert!(store.is_empty());
    }

    #[test]
    fn set_replaces_previous_entry() {
        let mut store = MemoryStore::new();
        store.set("k", 1.0.into());
        store.set("k", Sample::new(10.0, 2.0).into());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").and_then(StoredValue::as_sample), Some(Sample::new(10.0, 2.0)));
        assert_eq!(store.get("k").and_then(StoredValue::as_number), None);
    }

    #[test]
    fn remove_returns_entry() {
        let mut store = MemoryStore::new();
        store.set("k", 1.0.into());
        assert_eq!(store.remove("k"), Some(StoredValue::Number(1.0)));
        assert_eq!(store.remove("k"), None);
    }

    #[test]
    fn stored_values_use_readable_json() {
        let mut store = MemoryStore::new();
        store.set("n", 3.5.into());
        store.set("s", Sample::new(1.0, 2.0).into());
        store.set("l", vec![Sample::new(1.0, 2.0)].into());
        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "l": [{"timestamp": 1.0, "value": 2.0}],
                "n": 3.5,
                "s": {"timestamp": 1.0, "value": 2.0},
            })
        );
        let back: MemoryStore = serde_json::from_value(json).unwrap();
        assert_eq!(back, store);
    }

    #[test]
    fn file_store_starts_empty_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::scoped(dir.path(), "web01", "Memory").unwrap();
        assert!(store.entries().is_empty());
        assert_eq!(store.path(), dir.path().join("web01").join("Memory.json"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::scoped(dir.path(), "web01", "Memory").unwrap();
        store.set("mem.used.total", Sample::new(100.0, 700.0).into());
        store.save().unwrap();

        let reopened = FileStore::scoped(dir.path(), "web01", "Memory").unwrap();
        assert_eq!(
            reopened.get("mem.used.total").and_then(StoredValue::as_sample),
            Some(Sample::new(100.0, 700.0))
        );
        assert!(!dir.path().join("web01").join("Memory.json.tmp").exists());
    }

    #[test]
    fn corrupt_state_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let store = FileStore::open(&path).unwrap();
        assert!(store.entries().is_empty());
    }

    #[test]
    fn foreign_entries_do_not_discard_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{
                "restart_count_list": [{"timestamp": 0.0, "value": 5.0}],
                "legacy.key": "v1",
                "mem.used.total": null,
                "flag": true
            }"#,
        )
        .unwrap();
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.entries().keys().collect::<Vec<_>>(), vec!["restart_count_list"]);
        assert_eq!(
            store.get("restart_count_list").and_then(StoredValue::as_series),
            Some(&[Sample::new(0.0, 5.0)][..])
        );
    }

    #[test]
    fn path_components_are_sanitized() {
        let path = scoped_path(Path::new("/var/state"), "../etc", "Disk IO /dev/sda");
        assert_eq!(path, PathBuf::from("/var/state/.._etc/Disk_IO__dev_sda.json"));
        let path = scoped_path(Path::new("/var/state"), "..", "");
        assert_eq!(path, PathBuf::from("/var/state/_/_.json"));
    }
}
