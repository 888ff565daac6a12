//! Threshold levels for checkstate.
//!
//! This module defines the check [`Status`], level specifications and the
//! evaluator that turns a value plus its levels into a status. Raw level
//! configuration coming from check parameters is resolved into a typed
//! [`LevelSpec`] once at the boundary via [`LevelsConfig`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Result state of a check or of one of its sub-results.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Within configured levels
    #[default]
    Ok,
    /// Warning level breached
    Warn,
    /// Critical level breached
    Crit,
    /// The input could not be evaluated
    Unknown,
}

impl Status {
    /// All statuses in exit-code order.
    pub const ALL: [Status; 4] = [Status::Ok, Status::Warn, Status::Crit, Status::Unknown];

    /// Process exit code used by monitoring plugins.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Warn => 1,
            Self::Crit => 2,
            Self::Unknown => 3,
        }
    }

    /// Marker appended to sub-results in a combined summary.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Ok => "",
            Self::Warn => "(!)",
            Self::Crit => "(!!)",
            Self::Unknown => "(?)",
        }
    }

    pub fn from_exit_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.exit_code() == code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Crit => "CRIT",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Which side of a threshold is bad.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Direction {
    /// Breached when the value is at or above the threshold
    #[default]
    Upper,
    /// Breached when the value is at or below the threshold
    Lower,
}

/// Warning and critical thresholds, each independently optional.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Levels {
    /// Thresholds in the unit of the evaluated value
    Absolute { warn: Option<f64>, crit: Option<f64> },
    /// Thresholds in percent of a reference total
    Percentage { warn: Option<f64>, crit: Option<f64> },
}

/// Levels together with the direction they apply in.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct LevelSpec {
    pub levels: Levels,
    pub direction: Direction,
}

impl LevelSpec {
    pub fn upper(warn: Option<f64>, crit: Option<f64>) -> Self {
        Self {
            levels: Levels::Absolute { warn, crit },
            direction: Direction::Upper,
        }
    }

    pub fn lower(warn: Option<f64>, crit: Option<f64>) -> Self {
        Self {
            levels: Levels::Absolute { warn, crit },
            direction: Direction::Lower,
        }
    }

    pub fn upper_percent(warn: Option<f64>, crit: Option<f64>) -> Self {
        Self {
            levels: Levels::Percentage { warn, crit },
            direction: Direction::Upper,
        }
    }

    pub fn lower_percent(warn: Option<f64>, crit: Option<f64>) -> Self {
        Self {
            levels: Levels::Percentage { warn, crit },
            direction: Direction::Lower,
        }
    }

    pub fn is_percentage(&self) -> bool {
        matches!(self.levels, Levels::Percentage { .. })
    }

    /// Absolute `(warn, crit)` thresholds.
    ///
    /// Percentage levels are scaled by `reference_total`; `None` is returned
    /// when they cannot be (no reference or a non-positive one).
    pub fn absolute(&self, reference_total: Option<f64>) -> Option<(Option<f64>, Option<f64>)> {
        match self.levels {
            Levels::Absolute { warn, crit } => Some((warn, crit)),
            Levels::Percentage { warn, crit } => {
                let total = reference_total.filter(|t| *t > 0.0)?;
                let scale = |pct: f64| total * pct / 100.0;
                Some((warn.map(scale), crit.map(scale)))
            }
        }
    }
}

/// Level configuration as written in check parameters.
///
/// Accepted shapes are `[warn, crit]` and `["perc", [warn, crit]]`; either
/// threshold may be `null`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum LevelsConfig {
    Absolute(Option<f64>, Option<f64>),
    Tagged(String, (Option<f64>, Option<f64>)),
}

impl LevelsConfig {
    /// Resolve into a typed [`LevelSpec`] for `direction`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown tag or a non-finite threshold.
    pub fn resolve(&self, direction: Direction) -> Result<LevelSpec, ConfigError> {
        let (levels, warn, crit) = match self {
            Self::Absolute(warn, crit) => (
                Levels::Absolute {
                    warn: *warn,
                    crit: *crit,
                },
                *warn,
                *crit,
            ),
            Self::Tagged(tag, (warn, crit)) if tag == "perc" => (
                Levels::Percentage {
                    warn: *warn,
                    crit: *crit,
                },
                *warn,
                *crit,
            ),
            Self::Tagged(tag, _) => return Err(ConfigError::UnknownLevelType(tag.clone())),
        };
        if let Some(bad) = [warn, crit].into_iter().flatten().find(|t| !t.is_finite()) {
            return Err(ConfigError::NonFiniteThreshold(bad));
        }
        Ok(LevelSpec { levels, direction })
    }
}

/// Result of evaluating a value against its levels.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct LevelsOutcome {
    pub status: Status,
    /// Absolute warning threshold that was applied
    pub warn: Option<f64>,
    /// Absolute critical threshold that was applied
    pub crit: Option<f64>,
    pub direction: Direction,
}

impl LevelsOutcome {
    /// Level description for the summary, empty while the status is OK.
    pub fn describe(&self, render: impl Fn(f64) -> String) -> String {
        match self.status {
            Status::Ok => String::new(),
            Status::Unknown => " (levels cannot be applied)".into(),
            Status::Warn | Status::Crit => levels_text(self.direction, self.warn, self.crit, render),
        }
    }
}

/// Render `" (warn/crit at W/C)"` or `" (warn/crit below W/C)"`.
pub fn levels_text(
    direction: Direction,
    warn: Option<f64>,
    crit: Option<f64>,
    render: impl Fn(f64) -> String,
) -> String {
    let word = match direction {
        Direction::Upper => "at",
        Direction::Lower => "below",
    };
    let show = |t: Option<f64>| t.map_or_else(|| "-".to_string(), &render);
    format!(" (warn/crit {} {}/{})", word, show(warn), show(crit))
}

/// Evaluate `value` against `levels`.
///
/// No levels means OK. Percentage levels without a positive
/// `reference_total`, or a non-finite value, mean UNKNOWN. Critical is
/// checked before warning.
pub fn evaluate(value: f64, levels: Option<&LevelSpec>, reference_total: Option<f64>) -> LevelsOutcome {
    let Some(spec) = levels else {
        return LevelsOutcome::default();
    };
    let unknown = LevelsOutcome {
        status: Status::Unknown,
        direction: spec.direction,
        ..LevelsOutcome::default()
    };
    let Some((warn, crit)) = spec.absolute(reference_total) else {
        log::debug!("percentage levels need a positive total, got {:?}", reference_total);
        return unknown;
    };
    if !value.is_finite() {
        return unknown;
    }

    let breached = |threshold: Option<f64>| match (spec.direction, threshold) {
        (Direction::Upper, Some(t)) => value >= t,
        (Direction::Lower, Some(t)) => value <= t,
        (_, None) => false,
    };
    let status = if breached(crit) {
        Status::Crit
    } else if breached(warn) {
        Status::Warn
    } else {
        Status::Ok
    };

    LevelsOutcome {
        status,
        warn,
        crit,
        direction: spec.direction,
    }
}

/// Evaluate `value` against upper and lower levels at once.
///
/// The more severe outcome wins (UNKNOWN before CRIT before WARN); on a
/// tie the upper outcome is reported.
///
/// This ranking is fixed and independent of the [`StatusOrder`] a report
/// uses: an edge that cannot be evaluated (a percentage level without a
/// reference total) hides a breach of the other edge rather than being
/// hidden by it. The report applies its own order across contributions.
///
/// [`StatusOrder`]: crate::metrics::StatusOrder
pub fn evaluate_bounds(
    value: f64,
    upper: Option<&LevelSpec>,
    lower: Option<&LevelSpec>,
    reference_total: Option<f64>,
) -> LevelsOutcome {
    let rank = |s: Status| match s {
        Status::Ok => 0,
        Status::Warn => 1,
        Status::Crit => 2,
        Status::Unknown => 3,
    };
    let up = evaluate(value, upper, reference_total);
    let low = evaluate(value, lower, reference_total);
    if rank(low.status) > rank(up.status) {
        low
    } else {
        up
    }
}
