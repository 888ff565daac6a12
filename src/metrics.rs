//! Metric and report data structures for checkstate.
//!
//! A check assembles its result from one or more [`Contribution`]s (a
//! status, a summary fragment and some named [`Metric`]s) into a
//! [`MetricReport`]. The report's status is the worst contributed status
//! according to a configurable [`StatusOrder`]; metrics only carry
//! thresholds and bounds for graphing and never influence the status.

use std::fmt;

use serde::Serialize;

use crate::error::ConfigError;
use crate::thresholds::Status;

/// A named numeric observation with optional graphing hints.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Metric {
    /// Metric name, e.g. `mem_used`
    pub name: String,
    /// Observed value
    pub value: f64,
    /// Warning threshold line
    pub warn: Option<f64>,
    /// Critical threshold line
    pub crit: Option<f64>,
    /// Lower bound of the value range
    pub min: Option<f64>,
    /// Upper bound of the value range
    pub max: Option<f64>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            warn: None,
            crit: None,
            min: None,
            max: None,
        }
    }

    pub fn with_levels(mut self, warn: Option<f64>, crit: Option<f64>) -> Self {
        self.warn = warn;
        self.crit = crit;
        self
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Renders as performance data: `name=value;warn;crit;min;max`.
///
/// Absent fields are left empty and trailing empty fields are dropped.
impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = vec![format_number(self.value)];
        fields.extend(
            [self.warn, self.crit, self.min, self.max]
                .into_iter()
                .map(|v| v.map(format_number).unwrap_or_default()),
        );
        while fields.len() > 1 && fields.last().is_some_and(String::is_empty) {
            fields.pop();
        }
        let name = if self.name.contains([' ', '=', '\'']) {
            format!("'{}'", self.name.replace('\'', "_"))
        } else {
            self.name.clone()
        };
        write!(f, "{}={}", name, fields.join(";"))
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// One partial result of a check.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contribution {
    pub status: Status,
    /// Human readable fragment, may be empty
    pub summary: String,
    pub metrics: Vec<Metric>,
}

impl Contribution {
    pub fn new(status: Status, summary: impl Into<String>) -> Self {
        Self {
            status,
            summary: summary.into(),
            metrics: Vec::new(),
        }
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }
}

/// Total order over statuses used to pick the worst one.
///
/// Plugins historically disagree on where UNKNOWN ranks, so the order is
/// explicit. The default is [`StatusOrder::crit_worst`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusOrder {
    /// Statuses from least to most severe
    ascending: [Status; 4],
}

impl StatusOrder {
    /// Build an order from statuses listed least severe first.
    ///
    /// # Errors
    ///
    /// Returns an error unless every status appears exactly once.
    pub fn new(ascending: [Status; 4]) -> Result<Self, ConfigError> {
        let complete = Status::ALL.iter().all(|s| ascending.contains(s));
        if complete {
            Ok(Self { ascending })
        } else {
            Err(ConfigError::InvalidStatusOrder)
        }
    }

    /// OK < WARN < UNKNOWN < CRIT.
    pub fn crit_worst() -> Self {
        Self {
            ascending: [Status::Ok, Status::Warn, Status::Unknown, Status::Crit],
        }
    }

    /// OK < WARN < CRIT < UNKNOWN.
    pub fn unknown_worst() -> Self {
        Self {
            ascending: [Status::Ok, Status::Warn, Status::Crit, Status::Unknown],
        }
    }

    /// Severity rank of `status`, 0 being the least severe.
    pub fn rank(&self, status: Status) -> usize {
        self.ascending
            .iter()
            .position(|s| *s == status)
            .unwrap_or(0)
    }

    /// The more severe of two statuses.
    pub fn worst(&self, a: Status, b: Status) -> Status {
        if self.rank(b) > self.rank(a) {
            b
        } else {
            a
        }
    }
}

impl Default for StatusOrder {
    fn default() -> Self {
        Self::crit_worst()
    }
}

/// Combined result of a check.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricReport {
    order: StatusOrder,
    contributions: Vec<Contribution>,
}

impl MetricReport {
    pub fn new(order: StatusOrder) -> Self {
        Self {
            order,
            contributions: Vec::new(),
        }
    }

    pub fn add(&mut self, contribution: Contribution) {
        self.contributions.push(contribution);
    }

    /// Append every contribution of `other`.
    pub fn extend(&mut self, other: impl IntoIterator<Item = Contribution>) {
        self.contributions.extend(other);
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    /// Worst contributed status; OK for an empty report.
    pub fn status(&self) -> Status {
        self.contributions
            .iter()
            .fold(Status::Ok, |acc, c| self.order.worst(acc, c.status))
    }

    /// Non-empty summaries joined with `", "`.
    ///
    /// With more than one fragment, each non-OK fragment carries its own
    /// status marker so an individually failing sub-result stands out.
    /// Fragments are marked by their own status, not by whether it differs
    /// from the overall one: a WARN fragment next to a CRIT one still gets
    /// `(!)`, which is how monitoring plugins conventionally flag sub-results.
    pub fn summary(&self) -> String {
        let parts: Vec<&Contribution> = self
            .contributions
            .iter()
            .filter(|c| !c.summary.is_empty())
            .collect();
        let annotate = parts.len() > 1;
        parts
            .iter()
            .map(|c| {
                if annotate {
                    format!("{}{}", c.summary, c.status.marker())
                } else {
                    c.summary.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Union of all contributed metrics.
    ///
    /// A later metric with the same name replaces an earlier one in place.
    pub fn metrics(&self) -> Vec<Metric> {
        let mut merged: Vec<Metric> = Vec::new();
        for metric in self.contributions.iter().flat_map(|c| &c.metrics) {
            match merged.iter_mut().find(|m| m.name == metric.name) {
                Some(existing) => *existing = metric.clone(),
                None => merged.push(metric.clone()),
            }
        }
        merged
    }

    /// Space separated performance data.
    pub fn perfdata(&self) -> String {
        self.metrics()
            .iter()
            .map(Metric::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Renders as a plugin output line: `STATUS - summary | perfdata`.
impl fmt::Display for MetricReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.status(), self.summary())?;
        let perfdata = self.perfdata();
        if !perfdata.is_empty() {
            write!(f, " | {}", perfdata)?;
        }
        Ok(())
    }
}

/// One line of the CSV result log.
#[derive(Serialize, Clone, Debug)]
pub struct ReportRecord {
    /// Evaluation time in seconds since the epoch
    pub timestamp: f64,
    /// ISO 8601 formatted evaluation time
    pub datetime: String,
    pub host: String,
    pub service: String,
    pub status: Status,
    pub summary: String,
    pub perfdata: String,
}

impl ReportRecord {
    pub fn new(report: &MetricReport, timestamp: f64, datetime: String, host: &str, service: &str) -> Self {
        Self {
            timestamp,
            datetime,
            host: host.to_owned(),
            service: service.to_owned(),
            status: report.status(),
            summary: report.summary(),
            perfdata: report.perfdata(),
        }
    }
}
