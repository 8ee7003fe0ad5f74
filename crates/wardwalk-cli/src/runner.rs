//! Scenario runner implementation
//!
//! Configuration layers, lowest first: built-in defaults, the `--config`
//! file, `WARDWALK_*` environment variables, command-line flags.
//!
//! Ctrl-C during `run` stops the scenario in flight, closes its browser and
//! skips the rest; the report is still printed and written.

use std::future::Future;
use std::path::{Path, PathBuf};
use wardwalk::{
    catalog, load_definitions, Credentials, HarnessConfig, Scenario, SessionFactory, SuiteReport,
    SuiteRunner, WardwalkError,
};

use crate::commands::{HarnessArgs, RunArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;

/// Effective harness configuration
pub fn harness_config(file: Option<&Path>, flags: &HarnessArgs) -> CliResult<HarnessConfig> {
    let base = match file {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    Ok(apply_flags(base.with_env(), flags))
}

/// Apply command-line overrides
#[must_use]
pub fn apply_flags(mut config: HarnessConfig, flags: &HarnessArgs) -> HarnessConfig {
    if let Some(url) = &flags.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(email) = &flags.email {
        config.credentials.email.clone_from(email);
    }
    if let Some(password) = &flags.password {
        config.credentials.password.clone_from(password);
    }
    if let Some(timeout) = flags.wait_timeout {
        config.wait.timeout_ms = timeout;
    }
    if let Some(interval) = flags.poll_interval {
        config.wait.poll_interval_ms = interval;
    }
    if let Some(limit) = flags.scenario_timeout {
        config.scenario_timeout_ms = Some(limit);
    }
    if flags.headed {
        config.browser.headless = false;
    }
    if flags.no_sandbox {
        config.browser.sandbox = false;
    }
    if let Some(path) = &flags.chromium {
        config.browser.chromium_path = Some(path.clone());
    }
    config
}

/// Copy of the configuration that is safe to print
#[must_use]
pub fn redacted(config: &HarnessConfig) -> HarnessConfig {
    let mut shown = config.clone();
    if !shown.credentials.password.is_empty() {
        shown.credentials.password = "<redacted>".to_string();
    }
    shown
}

/// Scenarios from a file, using `credentials` where the file has none
pub fn load_file(path: &Path, credentials: &Credentials) -> CliResult<Vec<Scenario>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::invalid_argument(format!("cannot read {}: {e}", path.display())))?;
    let definitions = load_definitions(&text).map_err(|e| in_file(path, e))?;
    if definitions.is_empty() {
        return Err(CliError::invalid_argument(format!(
            "{} holds no scenarios",
            path.display()
        )));
    }
    definitions
        .into_iter()
        .map(|d| d.into_scenario(credentials).map_err(|e| in_file(path, e)))
        .collect()
}

fn in_file(path: &Path, error: WardwalkError) -> CliError {
    CliError::invalid_argument(format!("{}: {error}", path.display()))
}

/// Scenarios selected by `run`: named built-ins, then files, or every built-in
pub fn select_scenarios(
    names: &[String],
    files: &[PathBuf],
    credentials: &Credentials,
) -> CliResult<Vec<Scenario>> {
    if names.is_empty() && files.is_empty() {
        return Ok(catalog::all(credentials)?);
    }
    let mut scenarios = names
        .iter()
        .map(|name| catalog::builtin(name, credentials.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    for path in files {
        scenarios.extend(load_file(path, credentials)?);
    }
    Ok(scenarios)
}

/// Write the suite report as pretty JSON
pub fn write_report(path: &Path, report: &SuiteReport) -> CliResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

/// Runs selected scenarios and reports progress
#[derive(Debug)]
pub struct ScenarioRunner {
    config: CliConfig,
    harness: HarnessConfig,
    fail_fast: bool,
}

impl ScenarioRunner {
    /// Create a runner
    #[must_use]
    pub const fn new(config: CliConfig, harness: HarnessConfig) -> Self {
        Self {
            config,
            harness,
            fail_fast: false,
        }
    }

    /// Stop after the first failing scenario
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Harness configuration in effect
    #[must_use]
    pub const fn harness(&self) -> &HarnessConfig {
        &self.harness
    }

    /// Run scenarios in sessions from `factory`
    pub async fn run<F: SessionFactory>(&self, factory: F, scenarios: &[Scenario]) -> SuiteReport {
        self.run_until(factory, scenarios, std::future::pending::<()>())
            .await
    }

    /// Run scenarios until `cancel` resolves
    pub async fn run_until<F, C>(
        &self,
        factory: F,
        scenarios: &[Scenario],
        cancel: C,
    ) -> SuiteReport
    where
        F: SessionFactory,
        C: Future<Output = ()>,
    {
        let mut reporter = ProgressReporter::new(
            self.config.color.should_color(),
            self.config.verbosity.is_quiet(),
        )
        .with_steps(self.config.verbosity.is_verbose());

        reporter.header("Wardwalk");
        reporter.info(&format!(
            "{} scenario(s) against {}",
            scenarios.len(),
            self.harness.base_url
        ));

        let suite = SuiteRunner::new(factory, self.harness.executor_config())
            .with_fail_fast(self.fail_fast)
            .with_scenario_timeout(self.harness.scenario_timeout());

        reporter.start_progress(scenarios.len() as u64, "running");
        let report = suite
            .run_until(scenarios, cancel, |result| {
                reporter.scenario(result);
                reporter.increment(1);
            })
            .await;
        reporter.finish();
        reporter.summary(&report);
        report
    }
}

/// `run` command: select, validate, execute, report
pub fn execute_run(config: CliConfig, file: Option<&Path>, args: &RunArgs) -> CliResult<()> {
    let harness = harness_config(file, &args.harness)?;
    let scenarios = select_scenarios(&args.scenarios, &args.files, &harness.credentials)?;
    harness.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let runner = ScenarioRunner::new(config, harness).with_fail_fast(args.fail_fast);
    let report = runtime.block_on(run_in_browser(&runner, &scenarios))?;

    if let Some(path) = &args.json {
        write_report(path, &report)?;
        tracing::info!(path = %path.display(), "report written");
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: report.failed() + report.skipped.len(),
            total: scenarios.len(),
        })
    }
}

#[cfg(feature = "browser")]
async fn run_in_browser(runner: &ScenarioRunner, scenarios: &[Scenario]) -> CliResult<SuiteReport> {
    let factory = wardwalk::ChromiumSessionFactory::new(runner.harness().browser.clone());
    Ok(runner.run_until(factory, scenarios, interrupted()).await)
}

/// Resolves on the first Ctrl-C, or never if no handler can be installed
#[cfg(feature = "browser")]
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::warn!("interrupted, stopping the run");
}

#[cfg(not(feature = "browser"))]
#[allow(clippy::unused_async)]
async fn run_in_browser(_runner: &ScenarioRunner, _scenarios: &[Scenario]) -> CliResult<SuiteReport> {
    Err(CliError::config("wardwalk was built without the `browser` feature"))
}
