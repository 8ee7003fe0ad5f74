//! Wardwalk CLI: run hospital-management UI scenarios
//!
//! ## Usage
//!
//! ```bash
//! wardwalk run                               # every built-in scenario
//! wardwalk run appointment-crud --json out.json
//! wardwalk run --file scenarios.yaml --headed
//! wardwalk show patient-crud > patient.yaml  # start a custom scenario
//! wardwalk validate patient.yaml
//! ```

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use wardwalk::{catalog, Credentials, WardwalkError};
use wardwalk_cli::{
    execute_run, harness_config, load_file, logging, redacted, Cli, CliConfig, CliResult,
    ColorChoice, Commands, ConfigArgs, LogFormat, ShowArgs, ValidateArgs, Verbosity,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init(config.verbosity, config.log_format)?;

    let file = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => execute_run(config, file, &args),
        Commands::List => {
            run_list();
            Ok(())
        }
        Commands::Show(args) => run_show(&args),
        Commands::Validate(args) => run_validate(&config, &args),
        Commands::Config(args) => run_config(file, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.into();
    let log_format: LogFormat = cli.log_format.into();

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_log_format(log_format)
}

fn placeholder_credentials() -> Credentials {
    Credentials::new("", "")
}

fn run_list() {
    for name in catalog::BUILTIN_SCENARIOS {
        match catalog::builtin(name, placeholder_credentials()) {
            Ok(scenario) => println!(
                "{name:<20} {:>2} steps  {}",
                scenario.steps().len(),
                scenario.description().unwrap_or_default()
            ),
            Err(e) => println!("{name:<20} unavailable: {e}"),
        }
    }
}

fn run_show(args: &ShowArgs) -> CliResult<()> {
    let scenario = catalog::builtin(&args.name, placeholder_credentials())?;
    print!("{}", scenario.to_definition().to_yaml()?);
    Ok(())
}

fn run_validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    let mut invalid = Vec::new();
    for path in &args.files {
        match load_file(path, &placeholder_credentials()) {
            Ok(scenarios) => {
                if !config.verbosity.is_quiet() {
                    for scenario in &scenarios {
                        println!(
                            "ok   {}: {} ({} steps)",
                            path.display(),
                            scenario.name(),
                            scenario.steps().len()
                        );
                    }
                }
            }
            Err(e) => {
                eprintln!("FAIL {e}");
                invalid.push(path.display().to_string());
            }
        }
    }
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(wardwalk_cli::CliError::invalid_argument(format!(
            "invalid scenario files: {}",
            invalid.join(", ")
        )))
    }
}

fn run_config(file: Option<&Path>, args: &ConfigArgs) -> CliResult<()> {
    let harness = harness_config(file, &args.harness)?;
    let yaml = serde_yaml_ng::to_string(&redacted(&harness)).map_err(WardwalkError::from)?;
    print!("{yaml}");
    if let Err(e) = harness.validate() {
        eprintln!("warning: {e}");
    }
    Ok(())
}
