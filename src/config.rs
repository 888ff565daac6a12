//! Command-line configuration for checkstate.
//!
//! This module defines all CLI arguments using `clap` for parsing.
//! Global options select the state location and the object being checked;
//! the subcommand selects what to evaluate.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use checkstate::StatusOrder;

/// Evaluate one monitoring check with persistent state.
///
/// Each invocation loads the state of one host + service pair, evaluates
/// the requested check, prints a plugin output line and exits with the
/// plugin status code (0 OK, 1 WARN, 2 CRIT, 3 UNKNOWN).
///
/// # Examples
///
/// ```bash
/// # Memory of the local machine, percentage levels, 15 minute average
/// checkstate memory --params '{"levels": ["perc", [80, 90]], "average": 15}'
///
/// # Restarts within the last hour of a container
/// checkstate --host k8s-node1 --service "Pod web-1" restarts --count 7 \
///     --params '{"levels": [1, 3]}'
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Evaluate monitoring checks with persistent per-service state")]
pub struct Config {
    /// Directory holding one state file per host and service.
    #[arg(long, default_value = "state")]
    pub state_dir: PathBuf,

    /// Name of the monitored host.
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Name of the service; defaults to the check name.
    #[arg(short, long)]
    pub service: Option<String>,

    /// Evaluation time in seconds since the epoch.
    ///
    /// Defaults to the current time. Passing it explicitly makes runs
    /// reproducible.
    #[arg(long)]
    pub now: Option<f64>,

    /// Append every result to this CSV file.
    #[arg(short = 'c', long)]
    pub csv_log: Option<PathBuf>,

    /// Write state files even when running as root.
    #[arg(long)]
    pub allow_root: bool,

    /// How UNKNOWN ranks against CRIT when combining results.
    #[arg(long, value_enum, default_value_t = OrderArg::CritWorst)]
    pub status_order: OrderArg,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Service name, falling back to the check's default.
    pub fn service_name(&self) -> String {
        self.service
            .clone()
            .unwrap_or_else(|| self.command.default_service())
    }
}

/// Check to evaluate.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Used memory against levels; reads the local host when sizes are omitted.
    Memory {
        /// Total memory in bytes
        #[arg(long, requires = "free")]
        total: Option<f64>,
        /// Free memory in bytes
        #[arg(long, requires = "total")]
        free: Option<f64>,
        /// JSON parameters: {"levels": [w, c] | ["perc", [w, c]], "average": minutes}
        #[arg(short, long, default_value = "")]
        params: String,
    },
    /// Total restarts and restarts within a trailing window.
    Restarts {
        /// Cumulative restart count reported by the source
        #[arg(long)]
        count: u64,
        /// JSON parameters: {"levels": [w, c], "total_levels": [w, c], "window": seconds}
        #[arg(short, long, default_value = "")]
        params: String,
    },
    /// A single value against upper and lower levels.
    Levels {
        /// Metric name
        #[arg(long, default_value = "value")]
        name: String,
        /// Value to evaluate
        #[arg(long, allow_hyphen_values = true)]
        value: f64,
        /// Reference total for percentage levels
        #[arg(long)]
        reference_total: Option<f64>,
        /// JSON parameters: {"levels": .., "levels_lower": ..}
        #[arg(short, long, default_value = "")]
        params: String,
    },
    /// Smooth a value with a time-weighted moving average.
    Average {
        /// Store key of the average
        #[arg(long)]
        key: String,
        /// Current sample
        #[arg(long, allow_hyphen_values = true)]
        value: f64,
        /// Averaging window in minutes
        #[arg(long)]
        window_minutes: f64,
    },
    /// Per-second rate of a monotonically increasing counter.
    Rate {
        /// Store key of the counter
        #[arg(long)]
        key: String,
        /// Current counter value
        #[arg(long)]
        value: f64,
    },
}

impl Command {
    fn default_service(&self) -> String {
        match self {
            Self::Memory { .. } => "Memory".into(),
            Self::Restarts { .. } => "Restarts".into(),
            Self::Levels { name, .. } => name.clone(),
            Self::Average { key, .. } | Self::Rate { key, .. } => key.clone(),
        }
    }
}

/// Ranking of UNKNOWN when combining results.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderArg {
    /// OK < WARN < UNKNOWN < CRIT
    CritWorst,
    /// OK < WARN < CRIT < UNKNOWN
    UnknownWorst,
}

impl From<OrderArg> for StatusOrder {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::CritWorst => StatusOrder::crit_worst(),
            OrderArg::UnknownWorst => StatusOrder::unknown_worst(),
        }
    }
}
