//! Reference checks built on the evaluation core.
//!
//! These are the two compositions the core is usually wired into: a memory
//! usage check (optionally averaged, absolute or percentage levels) and a
//! restart-rate check (a cumulative restart counter turned into "restarts
//! in the last ~hour"). Parameters arrive as JSON documents and are
//! resolved into typed levels before any evaluation happens.

use serde::Deserialize;

use crate::average::moving_average;
use crate::error::ConfigError;
use crate::metrics::{Contribution, Metric};
use crate::render;
use crate::store::ValueStore;
use crate::thresholds::{evaluate, evaluate_bounds, Direction, LevelSpec, LevelsConfig, Status};
use crate::window::{windowed_delta, WindowDelta};

/// Store key of the averaged used-memory value.
pub const MEM_AVERAGE_KEY: &str = "mem.used.total";

/// Store key of the restart counter history.
pub const RESTART_HISTORY_KEY: &str = "restart_count_list";

/// Default restart window in seconds.
pub const DEFAULT_RESTART_WINDOW: f64 = 3600.0;

/// Parameters of [`check_memory`].
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MemoryParams {
    /// Upper levels on used memory, absolute bytes or percent of total
    #[serde(default)]
    pub levels: Option<LevelsConfig>,
    /// Averaging window in minutes; levels apply to the average when set
    #[serde(default)]
    pub average: Option<f64>,
}

/// Parameters of [`check_restarts`].
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RestartParams {
    /// Upper levels on restarts within the window
    #[serde(default)]
    pub levels: Option<LevelsConfig>,
    /// Upper levels on the total restart count
    #[serde(default)]
    pub total_levels: Option<LevelsConfig>,
    /// Window length in seconds
    #[serde(default)]
    pub window: Option<f64>,
}

/// Parameters of [`check_value`].
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ValueParams {
    /// Levels breached at or above the thresholds
    #[serde(default)]
    pub levels: Option<LevelsConfig>,
    /// Levels breached at or below the thresholds
    #[serde(default)]
    pub levels_lower: Option<LevelsConfig>,
}

/// Decode check parameters, treating an empty document as defaults.
///
/// # Errors
///
/// Returns an error if `raw` is not a valid parameter document.
pub fn parse_params<T>(raw: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(raw)?)
}

fn resolve(levels: &Option<LevelsConfig>) -> Result<Option<LevelSpec>, ConfigError> {
    resolve_in(levels, Direction::Upper)
}

fn resolve_in(
    levels: &Option<LevelsConfig>,
    direction: Direction,
) -> Result<Option<LevelSpec>, ConfigError> {
    levels.as_ref().map(|l| l.resolve(direction)).transpose()
}

fn invalid(err: ConfigError) -> Vec<Contribution> {
    vec![Contribution::new(Status::Unknown, format!("Invalid parameters: {}", err))]
}

/// Check a single value against upper and lower levels.
///
/// Percentage levels are taken relative to `reference_total`.
pub fn check_value(
    name: &str,
    value: f64,
    reference_total: Option<f64>,
    params: &ValueParams,
) -> Vec<Contribution> {
    let upper = resolve_in(&params.levels, Direction::Upper);
    let lower = resolve_in(&params.levels_lower, Direction::Lower);
    let (upper, lower) = match (upper, lower) {
        (Ok(upper), Ok(lower)) => (upper, lower),
        (Err(err), _) | (_, Err(err)) => return invalid(err),
    };
    let outcome = evaluate_bounds(value, upper.as_ref(), lower.as_ref(), reference_total);
    let summary = format!(
        "{}: {}{}",
        name,
        render::float(value),
        outcome.describe(render::float)
    );
    vec![Contribution::new(outcome.status, summary).with_metric(
        Metric::new(name, value)
            .with_levels(outcome.warn, outcome.crit)
            .with_bounds(None, reference_total),
    )]
}

/// Check used memory (`total - free`, both in bytes) against its levels.
pub fn check_memory(
    store: &mut dyn ValueStore,
    now: f64,
    total: f64,
    free: f64,
    params: &MemoryParams,
) -> Vec<Contribution> {
    let spec = match resolve(&params.levels) {
        Ok(spec) => spec,
        Err(err) => return invalid(err),
    };
    if !total.is_finite() || !free.is_finite() || total < 0.0 || free < 0.0 || free > total {
        return vec![Contribution::new(
            Status::Unknown,
            format!("Invalid memory data: total {}, free {}", total, free),
        )];
    }

    let used = total - free;
    let evaluated = match params.average {
        Some(minutes) => moving_average(store, MEM_AVERAGE_KEY, now, used, minutes),
        None => used,
    };
    let outcome = evaluate(evaluated, spec.as_ref(), Some(total));

    let mut summary = format!("Used: {} of {}", render::bytes(used), render::bytes(total));
    if total > 0.0 {
        summary.push_str(&format!(" ({})", render::percent(used / total * 100.0)));
    }
    if let Some(minutes) = params.average {
        summary.push_str(&format!(
            ", {:.0} min average: {}",
            minutes,
            render::bytes(evaluated)
        ));
    }
    summary.push_str(&outcome.describe(render::bytes));

    let mut contribution = Contribution::new(outcome.status, summary).with_metric(
        Metric::new("mem_used", used)
            .with_levels(outcome.warn, outcome.crit)
            .with_bounds(Some(0.0), Some(total)),
    );
    if params.average.is_some() {
        contribution = contribution.with_metric(
            Metric::new("mem_used_avg", evaluated).with_levels(outcome.warn, outcome.crit),
        );
    }
    if total > 0.0 {
        contribution = contribution.with_metric(
            Metric::new("mem_used_percent", used / total * 100.0)
                .with_bounds(Some(0.0), Some(100.0)),
        );
    }
    vec![contribution]
}

/// Check a cumulative restart counter: its total and its increase within
/// the trailing window.
///
/// The windowed part is omitted until two snapshots exist within the
/// window, and for the one cycle in which the counter went backwards.
pub fn check_restarts(
    store: &mut dyn ValueStore,
    now: f64,
    restart_count: u64,
    params: &RestartParams,
) -> Vec<Contribution> {
    let (spec, total_spec) = match (resolve(&params.levels), resolve(&params.total_levels)) {
        (Ok(spec), Ok(total_spec)) => (spec, total_spec),
        (Err(err), _) | (_, Err(err)) => return invalid(err),
    };
    let count = restart_count as f64;
    let window = params.window.filter(|w| *w > 0.0).unwrap_or(DEFAULT_RESTART_WINDOW);

    let total = evaluate(count, total_spec.as_ref(), None);
    let mut contributions = vec![Contribution::new(
        total.status,
        format!("Total: {}{}", restart_count, total.describe(render::float)),
    )
    .with_metric(Metric::new("restart_count", count).with_levels(total.warn, total.crit))];

    match windowed_delta(store, RESTART_HISTORY_KEY, now, window, count) {
        WindowDelta::Delta { delta, .. } => {
            let outcome = evaluate(delta, spec.as_ref(), None);
            contributions.push(
                Contribution::new(
                    outcome.status,
                    format!(
                        "In last ~{}: {}{}",
                        render::age(window),
                        delta,
                        outcome.describe(render::float)
                    ),
                )
                .with_metric(
                    Metric::new("restart_rate", delta).with_levels(outcome.warn, outcome.crit),
                ),
            );
        }
        WindowDelta::InsufficientHistory => {}
        WindowDelta::CounterReset => {
            log::debug!("restart counter was reset, skipping windowed restarts");
        }
    }
    contributions
}
