//! # checkstate
//!
//! Command-line harness around the `checkstate` evaluation core.
//!
//! ## Overview
//!
//! One invocation evaluates one check for one host + service pair:
//!
//! 1. Load the state file `<state-dir>/<host>/<service>.json`
//! 2. Evaluate the requested check (memory, restarts, levels, average, rate)
//! 3. Print `STATUS - summary | perfdata`
//! 4. Save the state for the next invocation and optionally append the
//!    result to a CSV log
//! 5. Exit with the plugin status code
//!
//! Harness failures (unreadable state directory, unwritable log) are
//! reported as `UNKNOWN` with exit code 3.
//!
//! ## Usage
//!
//! ```bash
//! checkstate memory --params '{"levels": ["perc", [80, 90]]}'
//! RUST_LOG=debug checkstate --now 1700000000 restarts --count 4
//! ```
//!
//! ## Module Organization
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`app`]: One check invocation against a file-backed store

mod app;
mod config;

use std::process::ExitCode;

use clap::Parser;

use app::App;
use config::Config;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::parse();
    match run(config) {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(err) => {
            println!("UNKNOWN - {:#}", err);
            ExitCode::from(checkstate::Status::Unknown.exit_code())
        }
    }
}

fn run(config: Config) -> anyhow::Result<checkstate::Status> {
    let mut app = App::new(config)?;
    let report = app.evaluate();
    app.finish(&report)?;
    println!("{}", report);
    Ok(report.status())
}
