//! # checkstate
//!
//! Stateful metric evaluation for monitoring checks.
//!
//! ## Overview
//!
//! Most monitoring checks are thin: pull a few numbers out of agent output
//! and compare them with thresholds. The part worth getting right is the
//! stateful core they share:
//!
//! - **Moving averages** over irregularly spaced invocations
//! - **Windowed counters** ("restarts in the last hour") built from
//!   snapshots of a cumulative counter
//! - **Counter rates** from monotonically increasing counters
//! - **Levels**: warning/critical thresholds, absolute or as a percentage
//!   of a reference total, in either direction
//! - **Reports**: combining partial results into one status, summary and
//!   set of metrics
//!
//! All state lives in a [`ValueStore`](store::ValueStore) that the caller
//! owns and passes in explicitly, and every timestamp is supplied by the
//! caller, which keeps the core deterministic.
//!
//! ## Example
//!
//! ```
//! use checkstate::store::MemoryStore;
//! use checkstate::thresholds::{evaluate, LevelSpec, Status};
//! use checkstate::window::windowed_delta;
//!
//! let mut store = MemoryStore::new();
//! windowed_delta(&mut store, "restart_count_list", 0.0, 3600.0, 10.0);
//! let delta = windowed_delta(&mut store, "restart_count_list", 600.0, 3600.0, 13.0);
//!
//! let levels = LevelSpec::upper(Some(2.0), Some(5.0));
//! let outcome = evaluate(delta.value().unwrap_or(0.0), Some(&levels), None);
//! assert_eq!(outcome.status, Status::Warn);
//! ```
//!
//! ## Module Organization
//!
//! - [`store`]: per-object persistent state
//! - [`average`]: time-weighted moving average
//! - [`window`]: trailing-window counter deltas
//! - [`rate`]: counter rates
//! - [`thresholds`]: statuses, levels and their evaluation
//! - [`metrics`]: metrics and combined reports
//! - [`checks`]: memory and restart checks built from the above
//! - [`render`]: human-readable value formatting

pub mod average;
pub mod checks;
pub mod error;
pub mod metrics;
pub mod rate;
pub mod render;
pub mod store;
pub mod thresholds;
pub mod window;

pub use error::{ConfigError, StoreError};
pub use metrics::{Contribution, Metric, MetricReport, StatusOrder};
pub use store::{FileStore, MemoryStore, Sample, StoredValue, ValueStore};
pub use thresholds::{Direction, LevelSpec, Levels, LevelsOutcome, Status};
