//! Wardwalk CLI library
//!
//! Command-line interface for running Wardwalk scenarios.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
mod runner;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, HarnessArgs, LogFormatArg, RunArgs, ShowArgs,
    ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{format_duration, scenario_failure, ProgressReporter};
pub use runner::{
    apply_flags, execute_run, harness_config, load_file, redacted, select_scenarios, write_report,
    ScenarioRunner,
};
