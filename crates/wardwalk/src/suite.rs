//! Sequential suite runner.
//!
//! Runs scenarios one after another, each in a fresh session from a
//! [`SessionFactory`]. A failing scenario does not stop the suite unless
//! `fail_fast` is set; a session that cannot be opened counts as a failure
//! at step 0 of that scenario. An external cancellation stops the scenario
//! in flight (its session is still closed) and skips the rest.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::executor::{ExecutorConfig, ScenarioResult, WorkflowExecutor};
use crate::scenario::Scenario;
use crate::session::SessionFactory;

/// Results of one suite run
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Unique run identifier
    pub run_id: Uuid,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Per-scenario results, in run order
    pub results: Vec<ScenarioResult>,
    /// Scenarios not run because of `fail_fast` or cancellation
    pub skipped: Vec<String>,
    /// The run was cancelled from outside
    pub cancelled: bool,
    /// Total duration
    pub duration_ms: u64,
}

impl SuiteReport {
    /// Scenarios that completed
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Scenarios that failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// Every scenario ran and completed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped.is_empty()
    }
}

/// Runs a list of scenarios
#[derive(Debug)]
pub struct SuiteRunner<F: SessionFactory> {
    factory: F,
    executor: WorkflowExecutor,
    fail_fast: bool,
    scenario_timeout: Option<Duration>,
}

impl<F: SessionFactory> SuiteRunner<F> {
    /// Create a runner opening sessions from `factory`
    #[must_use]
    pub fn new(factory: F, config: ExecutorConfig) -> Self {
        Self {
            factory,
            executor: WorkflowExecutor::new(config),
            fail_fast: false,
            scenario_timeout: None,
        }
    }

    /// Stop after the first failing scenario
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Cancel any scenario running longer than `timeout`
    #[must_use]
    pub const fn with_scenario_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scenario_timeout = timeout;
        self
    }

    /// Session factory
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Run one scenario in a fresh session
    pub async fn run_one(&self, scenario: &Scenario) -> ScenarioResult {
        self.run_one_until(scenario, std::future::pending::<()>())
            .await
    }

    async fn run_one_until<C>(&self, scenario: &Scenario, cancel: C) -> ScenarioResult
    where
        C: Future<Output = ()>,
    {
        let session = match self.factory.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!(scenario = scenario.name(), error = %e, "could not open session");
                return ScenarioResult::not_started(scenario.name(), e.to_string());
            }
        };
        let limit = self.scenario_timeout;
        let stop = async move {
            let deadline = async {
                match limit {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                () = deadline => {}
                () = cancel => {}
            }
        };
        self.executor.run_until(scenario, session, stop).await
    }

    /// Run every scenario in order, calling `on_result` after each
    pub async fn run_with<C>(&self, scenarios: &[Scenario], on_result: C) -> SuiteReport
    where
        C: FnMut(&ScenarioResult),
    {
        self.run_until(scenarios, std::future::pending::<()>(), on_result)
            .await
    }

    /// Run every scenario in order until `cancel` resolves
    ///
    /// The scenario in flight when `cancel` resolves fails as cancelled and
    /// is torn down; the scenarios after it are skipped.
    pub async fn run_until<X, C>(
        &self,
        scenarios: &[Scenario],
        cancel: X,
        mut on_result: C,
    ) -> SuiteReport
    where
        X: Future<Output = ()>,
        C: FnMut(&ScenarioResult),
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        info!(%run_id, scenarios = scenarios.len(), "suite started");

        tokio::pin!(cancel);
        let mut cancelled = false;
        let mut results = Vec::with_capacity(scenarios.len());
        let mut skipped = Vec::new();
        for (i, scenario) in scenarios.iter().enumerate() {
            let result = {
                // polled at most until it first resolves
                let signal = async {
                    cancel.as_mut().await;
                    cancelled = true;
                };
                self.run_one_until(scenario, signal).await
            };
            on_result(&result);
            let failed = !result.is_success();
            results.push(result);
            if cancelled || (failed && self.fail_fast) {
                skipped = scenarios[i + 1..]
                    .iter()
                    .map(|s| s.name().to_string())
                    .collect();
                break;
            }
        }
        if cancelled {
            warn!(%run_id, skipped = skipped.len(), "suite cancelled");
        }

        let report = SuiteReport {
            run_id,
            started_at,
            results,
            skipped,
            cancelled,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            %run_id,
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped.len(),
            "suite finished"
        );
        report
    }

    /// Run every scenario in order
    pub async fn run(&self, scenarios: &[Scenario]) -> SuiteReport {
        self.run_with(scenarios, |_| {}).await
    }
}
