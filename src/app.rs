//! Application state and logic for checkstate.
//!
//! This module contains the [`App`] struct which runs one check invocation:
//! it loads the state of the checked object, evaluates the requested check,
//! logs the result and saves the state for the next invocation.

use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sysinfo::System;

use checkstate::average::moving_average;
use checkstate::checks::{self, parse_params, MemoryParams, RestartParams, ValueParams};
use checkstate::metrics::ReportRecord;
use checkstate::rate::{counter_rate, CounterRate};
use checkstate::{render, Contribution, FileStore, Metric, MetricReport, Status};

use crate::config::{Command, Config};

/// State of one check invocation.
pub struct App {
    /// Application configuration from CLI
    pub config: Config,

    /// Evaluation time in seconds since the epoch
    now: f64,

    /// Service the state belongs to
    service: String,

    /// State of the checked host + service
    store: FileStore,

    /// CSV writer for the result log
    csv_writer: Option<csv::Writer<File>>,
}

impl App {
    /// Create a new application instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file or the CSV log cannot be opened.
    pub fn new(config: Config) -> Result<Self> {
        let now = config.now.unwrap_or_else(wall_clock);
        let service = config.service_name();
        let store = FileStore::scoped(&config.state_dir, &config.host, &service)
            .context("loading check state")?;

        let csv_writer = match &config.csv_log {
            Some(path) => Some(open_csv(path)?),
            None => None,
        };

        Ok(Self {
            config,
            now,
            service,
            store,
            csv_writer,
        })
    }

    /// Evaluate the configured check against the loaded state.
    ///
    /// Invalid parameters do not fail the run; they turn into an UNKNOWN
    /// result.
    pub fn evaluate(&mut self) -> MetricReport {
        let mut report = MetricReport::new(self.config.status_order.into());
        let now = self.now;
        let store = &mut self.store;

        let contributions = match &self.config.command {
            Command::Memory { total, free, params } => {
                match parse_params::<MemoryParams>(params) {
                    Ok(params) => {
                        let (total, free) = match (total, free) {
                            (Some(total), Some(free)) => (*total, *free),
                            _ => local_memory(),
                        };
                        checks::check_memory(store, now, total, free, &params)
                    }
                    Err(err) => vec![invalid_params(err)],
                }
            }
            Command::Restarts { count, params } => match parse_params::<RestartParams>(params) {
                Ok(params) => checks::check_restarts(store, now, *count, &params),
                Err(err) => vec![invalid_params(err)],
            },
            Command::Levels {
                name,
                value,
                reference_total,
                params,
            } => match parse_params::<ValueParams>(params) {
                Ok(params) => checks::check_value(name, *value, *reference_total, &params),
                Err(err) => vec![invalid_params(err)],
            },
            Command::Average {
                key,
                value,
                window_minutes,
            } => {
                let average = moving_average(store, key, now, *value, *window_minutes);
                vec![Contribution::new(
                    Status::Ok,
                    format!(
                        "{} min average: {}",
                        render::float(*window_minutes),
                        render::float(average)
                    ),
                )
                .with_metric(Metric::new(format!("{}_avg", key), average))]
            }
            Command::Rate { key, value } => match counter_rate(store, key, now, *value) {
                CounterRate::PerSecond(rate) => vec![Contribution::new(
                    Status::Ok,
                    format!("Rate: {}/s", render::float(rate)),
                )
                .with_metric(Metric::new(format!("{}_rate", key), rate))],
                pending => {
                    log::info!("{}: no rate this cycle ({:?})", key, pending);
                    Vec::new()
                }
            },
        };

        report.extend(contributions);
        report
    }

    /// Persist the state and log `report`.
    ///
    /// State is not written while running as root unless explicitly
    /// allowed, so that root never leaves files the monitoring user
    /// cannot update.
    ///
    /// # Errors
    ///
    /// Returns an error if the state or the CSV log cannot be written.
    pub fn finish(&mut self, report: &MetricReport) -> Result<()> {
        if running_as_root() && !self.config.allow_root {
            log::warn!(
                "running as root, not saving state to {} (use --allow-root)",
                self.store.path().display()
            );
        } else {
            self.store.save().context("saving check state")?;
        }
        self.log_report(report)
    }

    /// Log a report to the CSV file.
    fn log_report(&mut self, report: &MetricReport) -> Result<()> {
        if let Some(ref mut writer) = self.csv_writer {
            let record = ReportRecord::new(
                report,
                self.now,
                format_datetime(self.now),
                &self.config.host,
                &self.service,
            );
            writer.serialize(record).context("writing CSV log")?;
            writer.flush().context("flushing CSV log")?;
        }
        Ok(())
    }
}

fn invalid_params(err: checkstate::ConfigError) -> Contribution {
    Contribution::new(Status::Unknown, format!("Invalid parameters: {}", err))
}

/// Open the CSV log in append mode, writing headers only for a new file.
fn open_csv(path: &Path) -> Result<csv::Writer<File>> {
    let exists = path.exists();
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("opening CSV log {}", path.display()))?;
    Ok(csv::WriterBuilder::new()
        .has_headers(!exists)
        .from_writer(file))
}

/// Total and available memory of the local host in bytes.
fn local_memory() -> (f64, f64) {
    let mut sys = System::new();
    sys.refresh_memory();
    (sys.total_memory() as f64, sys.available_memory() as f64)
}

fn wall_clock() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn format_datetime(timestamp: f64) -> String {
    DateTime::<Utc>::from_timestamp_millis((timestamp * 1000.0) as i64)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_default()
}

/// Check if running with elevated privileges.
fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}
