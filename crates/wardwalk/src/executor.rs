//! Workflow executor.
//!
//! Runs one [`Scenario`] against one [`Session`]:
//!
//! ```text
//! Idle ──► Authenticating ──► Executing(1) ──► ... ──► Executing(n) ──► Completed
//!               │                  │                        │
//!               └──────────────────┴────────────────────────┴─────────► Failed
//! ```
//!
//! Every step waits through the [`Waiter`] before it acts. The first timeout
//! or action failure ends the run; nothing is retried and nothing after the
//! failing step runs. The session is closed exactly once whichever way the
//! run ends, including external cancellation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::driver::{BrowserDriver, DriverError};
use crate::locator::ElementReference;
use crate::scenario::{Credentials, Scenario, Step, StepKind};
use crate::session::Session;
use crate::wait::{Readiness, TimeoutError, WaitError, WaitOptions, WaitResult, Waiter};

// =============================================================================
// STATE
// =============================================================================

/// Where a scenario run is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScenarioState {
    /// Not started
    Idle,
    /// Logging in
    Authenticating,
    /// Running the step with this (1-based) index
    Executing {
        /// Step index
        step: usize,
    },
    /// Every step succeeded
    Completed,
    /// Stopped at this step (0 = authentication)
    Failed {
        /// Step index
        step: usize,
    },
}

impl ScenarioState {
    /// Index of the step this state is working on (0 while authenticating)
    #[must_use]
    pub const fn step_index(&self) -> usize {
        match self {
            Self::Idle | Self::Authenticating | Self::Completed => 0,
            Self::Executing { step } | Self::Failed { step } => *step,
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Authenticating => f.write_str("authenticating"),
            Self::Executing { step } => write!(f, "executing({step})"),
            Self::Completed => f.write_str("completed"),
            Self::Failed { step } => write!(f, "failed({step})"),
        }
    }
}

/// Final outcome of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    /// Every step succeeded
    Completed,
    /// A step failed or the run was cancelled
    Failed,
}

// =============================================================================
// FAILURES
// =============================================================================

/// The driver could not act on an element, or failed while being polled
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{action} failed{}: {message}", .reference.as_ref().map(|r| format!(" on {r}")).unwrap_or_default())]
pub struct ActionError {
    /// Action attempted (`click`, `type`, `navigate`, ...)
    pub action: String,
    /// Element acted on, if any
    pub reference: Option<ElementReference>,
    /// Driver message
    pub message: String,
}

impl ActionError {
    fn driver(action: &str, reference: Option<&ElementReference>, error: &DriverError) -> Self {
        Self {
            action: action.to_string(),
            reference: reference.cloned(),
            message: error.to_string(),
        }
    }
}

/// Why a scenario failed
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// A wait ran out of time
    #[error(transparent)]
    Timeout(TimeoutError),
    /// An action on a ready element failed
    #[error(transparent)]
    Action(ActionError),
    /// Cancelled from outside while the step was in flight
    #[error("cancelled")]
    Cancelled,
}

impl From<WaitError> for FailureCause {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Timeout(timeout) => Self::Timeout(timeout),
            WaitError::Driver { reference, source } => {
                Self::Action(ActionError::driver("wait", Some(&reference), &source))
            }
        }
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// How a single step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Waited and acted successfully
    Passed,
    /// Timed out or failed to act
    Failed,
    /// Interrupted by cancellation
    Cancelled,
}

/// Record of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// 0 for the login sub-scenario, scenario steps from 1
    pub index: usize,
    /// Step label or derived description
    pub label: String,
    /// Step kind
    pub kind: StepKind,
    /// Time spent in the step (wait and action)
    pub elapsed_ms: u64,
    /// Outcome
    pub outcome: StepOutcome,
}

/// Machine-readable result of one scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario name
    pub scenario: String,
    /// Session the scenario ran in (`None` if it never opened)
    pub session: Option<Uuid>,
    /// Final status
    pub status: ScenarioStatus,
    /// Failing step (0 = authentication)
    pub failed_step: Option<usize>,
    /// Failure cause
    pub cause: Option<FailureCause>,
    /// States visited, in order
    pub transitions: Vec<ScenarioState>,
    /// Executed steps, in order
    pub steps: Vec<StepRecord>,
    /// Wall time including teardown
    pub duration_ms: u64,
    /// Teardown failure; does not affect `status`
    pub teardown_error: Option<String>,
}

impl ScenarioResult {
    /// Whether every step succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ScenarioStatus::Completed
    }

    /// Result for a scenario whose session could not be opened
    #[must_use]
    pub fn not_started(scenario: &str, message: impl Into<String>) -> Self {
        Self {
            scenario: scenario.to_string(),
            session: None,
            status: ScenarioStatus::Failed,
            failed_step: Some(0),
            cause: Some(FailureCause::Action(ActionError {
                action: "open session".to_string(),
                reference: None,
                message: message.into(),
            })),
            transitions: vec![ScenarioState::Idle, ScenarioState::Failed { step: 0 }],
            steps: Vec::new(),
            duration_ms: 0,
            teardown_error: None,
        }
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// The login sub-scenario shared by every workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginFlow {
    /// Login page path, joined to the base URL
    pub path: String,
    /// Email input
    pub email: ElementReference,
    /// Password input
    pub password: ElementReference,
    /// Submit control
    pub submit: ElementReference,
    /// Element that is visible only once logged in
    pub landing: ElementReference,
}

impl Default for LoginFlow {
    fn default() -> Self {
        Self {
            path: "/login".to_string(),
            email: ElementReference::id("email"),
            password: ElementReference::id("password"),
            submit: ElementReference::tagged_text("button", "Login"),
            landing: ElementReference::id("register-patient-button"),
        }
    }
}

impl LoginFlow {
    /// Steps that log in with `credentials`, each waiting up to `timeout_ms`
    #[must_use]
    pub fn steps(&self, credentials: &Credentials, timeout_ms: u64) -> Vec<Step> {
        vec![
            Step::navigate(self.path.clone())
                .with_target(self.email.clone())
                .with_predicate(Readiness::Visible)
                .with_label("login: open login page"),
            Step::type_text(self.email.clone(), credentials.email.clone())
                .with_label("login: email"),
            // the typed password must not end up in a TimeoutError
            Step::type_text(self.password.clone(), credentials.password.clone())
                .without_value_check()
                .with_label("login: password"),
            Step::click(self.submit.clone()).with_label("login: submit"),
            Step::wait_for(self.landing.clone()).with_label("login: landing page"),
        ]
        .into_iter()
        .map(|step| step.with_timeout_ms(timeout_ms))
        .collect()
    }
}

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Application root, e.g. `http://localhost:3000`
    pub base_url: String,
    /// Login sub-scenario
    pub login: LoginFlow,
    /// Poll interval and login timeout
    pub wait: WaitOptions,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            login: LoginFlow::default(),
            wait: WaitOptions::default(),
        }
    }
}

impl ExecutorConfig {
    /// Create a config for `base_url` with default login and waits
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set wait options
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Set the login flow
    #[must_use]
    pub fn with_login(mut self, login: LoginFlow) -> Self {
        self.login = login;
        self
    }

    /// Join a `/`-rooted path to the base URL; anything else is used as is
    #[must_use]
    pub fn resolve_url(&self, target: &str) -> String {
        if target.starts_with('/') {
            format!("{}{target}", self.base_url.trim_end_matches('/'))
        } else {
            target.to_string()
        }
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

struct InFlight {
    index: usize,
    label: String,
    kind: StepKind,
    started: Instant,
}

/// Mutable bookkeeping for one run; lives outside the driving future so
/// it survives cancellation
struct Run<'a> {
    scenario: &'a str,
    state: ScenarioState,
    transitions: Vec<ScenarioState>,
    steps: Vec<StepRecord>,
    in_flight: Option<InFlight>,
}

impl<'a> Run<'a> {
    fn new(scenario: &'a str) -> Self {
        Self {
            scenario,
            state: ScenarioState::Idle,
            transitions: vec![ScenarioState::Idle],
            steps: Vec::new(),
            in_flight: None,
        }
    }

    fn transition(&mut self, to: ScenarioState) {
        if self.state == to {
            return;
        }
        info!(scenario = self.scenario, from = %self.state, to = %to, "state transition");
        self.state = to;
        self.transitions.push(to);
    }

    fn begin(&mut self, index: usize, step: &Step) {
        let label = step.describe();
        debug!(scenario = self.scenario, step = index, kind = %step.kind, %label, "step started");
        self.in_flight = Some(InFlight {
            index,
            label,
            kind: step.kind,
            started: Instant::now(),
        });
    }

    fn finish(&mut self, outcome: StepOutcome) {
        if let Some(step) = self.in_flight.take() {
            let elapsed_ms = step.started.elapsed().as_millis() as u64;
            debug!(
                scenario = self.scenario,
                step = step.index,
                ?outcome,
                elapsed_ms,
                "step finished"
            );
            self.steps.push(StepRecord {
                index: step.index,
                label: step.label,
                kind: step.kind,
                elapsed_ms,
                outcome,
            });
        }
    }
}

/// Runs scenarios step by step against a session
#[derive(Debug, Clone)]
pub struct WorkflowExecutor {
    config: ExecutorConfig,
    waiter: Waiter,
}

impl WorkflowExecutor {
    /// Create an executor
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        let waiter = Waiter::with_options(&config.wait);
        Self { config, waiter }
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run to completion or first failure
    pub async fn run<D: BrowserDriver>(
        &self,
        scenario: &Scenario,
        session: Session<D>,
    ) -> ScenarioResult {
        self.run_until(scenario, session, std::future::pending::<()>())
            .await
    }

    /// Run, cancelling once `deadline` has elapsed
    pub async fn run_with_deadline<D: BrowserDriver>(
        &self,
        scenario: &Scenario,
        session: Session<D>,
        deadline: Duration,
    ) -> ScenarioResult {
        self.run_until(scenario, session, tokio::time::sleep(deadline))
            .await
    }

    /// Run, cancelling when `cancel` resolves
    pub async fn run_until<D, C>(
        &self,
        scenario: &Scenario,
        mut session: Session<D>,
        cancel: C,
    ) -> ScenarioResult
    where
        D: BrowserDriver,
        C: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut run = Run::new(scenario.name());
        info!(scenario = scenario.name(), session = %session.id(), steps = scenario.steps().len(), "scenario started");

        let outcome = {
            let drive = self.drive(scenario, session.driver_mut(), &mut run);
            tokio::select! {
                outcome = drive => Some(outcome),
                () = cancel => None,
            }
        };

        let failure = match outcome {
            Some(Ok(())) => None,
            Some(Err(failure)) => Some(failure),
            None => {
                run.finish(StepOutcome::Cancelled);
                Some((run.state.step_index(), FailureCause::Cancelled))
            }
        };
        let (failed_step, cause) = match failure {
            None => {
                run.transition(ScenarioState::Completed);
                (None, None)
            }
            Some((step, cause)) => {
                run.transition(ScenarioState::Failed { step });
                warn!(scenario = scenario.name(), step, %cause, "scenario failed");
                (Some(step), Some(cause))
            }
        };

        let teardown_error = match session.close().await {
            Ok(()) => None,
            Err(e) => {
                warn!(scenario = scenario.name(), session = %session.id(), error = %e, "session teardown failed");
                Some(e.to_string())
            }
        };

        let status = if cause.is_none() {
            ScenarioStatus::Completed
        } else {
            ScenarioStatus::Failed
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(scenario = scenario.name(), ?status, duration_ms, "scenario finished");

        ScenarioResult {
            scenario: scenario.name().to_string(),
            session: Some(session.id()),
            status,
            failed_step,
            cause,
            transitions: run.transitions,
            steps: run.steps,
            duration_ms,
            teardown_error,
        }
    }

    async fn drive<D: BrowserDriver>(
        &self,
        scenario: &Scenario,
        driver: &mut D,
        run: &mut Run<'_>,
    ) -> Result<(), (usize, FailureCause)> {
        run.transition(ScenarioState::Authenticating);
        let login = self
            .config
            .login
            .steps(scenario.credentials(), self.config.wait.timeout_ms);
        for step in &login {
            self.tracked(0, step, driver, run).await?;
        }

        for (i, step) in scenario.steps().iter().enumerate() {
            let index = i + 1;
            run.transition(ScenarioState::Executing { step: index });
            self.tracked(index, step, driver, run).await?;
        }
        Ok(())
    }

    async fn tracked<D: BrowserDriver>(
        &self,
        index: usize,
        step: &Step,
        driver: &mut D,
        run: &mut Run<'_>,
    ) -> Result<(), (usize, FailureCause)> {
        run.begin(index, step);
        match self.execute(step, driver).await {
            Ok(()) => {
                run.finish(StepOutcome::Passed);
                Ok(())
            }
            Err(cause) => {
                run.finish(StepOutcome::Failed);
                Err((index, cause))
            }
        }
    }

    async fn execute<D: BrowserDriver>(
        &self,
        step: &Step,
        driver: &mut D,
    ) -> Result<(), FailureCause> {
        match step.kind {
            StepKind::Navigate => {
                let url = self.config.resolve_url(payload(step)?);
                driver
                    .navigate(&url)
                    .await
                    .map_err(|e| FailureCause::Action(ActionError::driver("navigate", None, &e)))?;
                if let Some(target) = &step.target {
                    self.ready(driver, target, step).await?;
                }
            }
            StepKind::TypeText => {
                let target = target(step)?;
                let text = payload(step)?;
                let ready = self.ready(driver, target, step).await?;
                driver
                    .clear(&ready.handle)
                    .await
                    .map_err(|e| FailureCause::Action(ActionError::driver("clear", Some(target), &e)))?;
                driver
                    .type_text(&ready.handle, text)
                    .await
                    .map_err(|e| FailureCause::Action(ActionError::driver("type", Some(target), &e)))?;
                if step.verify_value {
                    let timeout = step.effective_timeout(&self.config.wait);
                    self.waiter
                        .until_value(driver, target, text, timeout)
                        .await?;
                }
            }
            StepKind::Click | StepKind::SelectOption => {
                let target = target(step)?;
                let ready = self.ready(driver, target, step).await?;
                driver
                    .click(&ready.handle)
                    .await
                    .map_err(|e| FailureCause::Action(ActionError::driver("click", Some(target), &e)))?;
            }
            StepKind::WaitOnly => {
                self.ready(driver, target(step)?, step).await?;
            }
        }
        Ok(())
    }

    async fn ready<D: BrowserDriver>(
        &self,
        driver: &mut D,
        target: &ElementReference,
        step: &Step,
    ) -> Result<WaitResult, FailureCause> {
        Ok(self
            .waiter
            .until_ready(
                driver,
                target,
                step.readiness(),
                step.effective_timeout(&self.config.wait),
            )
            .await?)
    }
}

impl Default for WorkflowExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

fn target(step: &Step) -> Result<&ElementReference, FailureCause> {
    step.target.as_ref().ok_or_else(|| {
        FailureCause::Action(ActionError {
            action: step.kind.to_string(),
            reference: None,
            message: "step has no target".to_string(),
        })
    })
}

fn payload(step: &Step) -> Result<&str, FailureCause> {
    step.payload.as_deref().ok_or_else(|| {
        FailureCause::Action(ActionError {
            action: step.kind.to_string(),
            reference: step.target.clone(),
            message: "step has no payload".to_string(),
        })
    })
}

// =============================================================================
// TESTS
// =============================================================================
