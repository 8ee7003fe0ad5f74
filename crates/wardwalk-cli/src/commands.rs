//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{ColorChoice, LogFormat};

/// Wardwalk: run hospital-management UI scenarios in a real browser
#[derive(Parser, Debug)]
#[command(name = "wardwalk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Harness configuration file (YAML)
    #[arg(short, long, global = true, env = "WARDWALK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios against the application
    Run(RunArgs),

    /// List built-in scenarios
    List,

    /// Print a built-in scenario as YAML
    Show(ShowArgs),

    /// Check scenario files without opening a browser
    Validate(ValidateArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Settings that override the configuration file and environment
#[derive(Args, Debug, Clone, Default)]
pub struct HarnessArgs {
    /// Application root URL
    #[arg(long, env = "WARDWALK_BASE_URL")]
    pub base_url: Option<String>,

    /// Login email
    #[arg(long, env = "WARDWALK_EMAIL")]
    pub email: Option<String>,

    /// Login password
    #[arg(long, env = "WARDWALK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Default wait timeout per step in milliseconds
    #[arg(long)]
    pub wait_timeout: Option<u64>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Cancel a scenario that runs longer than this (milliseconds)
    #[arg(long)]
    pub scenario_timeout: Option<u64>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the chromium sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Path to the chromium binary
    #[arg(long)]
    pub chromium: Option<String>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Built-in scenarios to run (all when neither names nor files are given)
    pub scenarios: Vec<String>,

    /// Scenario files to run
    #[arg(short, long = "file")]
    pub files: Vec<PathBuf>,

    /// Write the suite report as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Stop after the first failing scenario
    #[arg(long)]
    pub fail_fast: bool,

    /// Harness overrides
    #[command(flatten)]
    pub harness: HarnessArgs,
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Built-in scenario name
    pub name: String,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Scenario files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Harness overrides
    #[command(flatten)]
    pub harness: HarnessArgs,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    mod run_args_tests {
        use super::*;

        #[test]
        fn test_names_and_files() {
            let cli = Cli::parse_from([
                "wardwalk",
                "run",
                "patient-crud",
                "--file",
                "extra.yaml",
                "--fail-fast",
                "--json",
                "out.json",
            ]);
            let Commands::Run(args) = cli.command else {
                panic!("expected run");
            };
            assert_eq!(args.scenarios, ["patient-crud"]);
            assert_eq!(args.files, [PathBuf::from("extra.yaml")]);
            assert!(args.fail_fast);
            assert_eq!(args.json, Some(PathBuf::from("out.json")));
        }

        #[test]
        fn test_harness_flags() {
            let cli = Cli::parse_from([
                "wardwalk",
                "run",
                "--base-url",
                "http://staging:3000",
                "--wait-timeout",
                "4000",
                "--headed",
                "--no-sandbox",
            ]);
            let Commands::Run(args) = cli.command else {
                panic!("expected run");
            };
            assert_eq!(args.harness.base_url.as_deref(), Some("http://staging:3000"));
            assert_eq!(args.harness.wait_timeout, Some(4000));
            assert!(args.harness.headed);
            assert!(args.harness.no_sandbox);
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let cli = Cli::parse_from(["wardwalk", "list", "-vv", "--color", "never"]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.color, ColorArg::Never));
            assert!(matches!(cli.command, Commands::List));
        }
    }

    mod conversion_tests {
        use super::*;

        #[test]
        fn test_color_arg() {
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
        }

        #[test]
        fn test_log_format_arg() {
            assert_eq!(LogFormat::from(LogFormatArg::Json), LogFormat::Json);
        }
    }
}
