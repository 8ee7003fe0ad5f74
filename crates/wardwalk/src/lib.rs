//! Wardwalk: predicate-driven browser workflows for hospital-management UIs
//!
//! Wardwalk drives a single-page hospital application through a real browser
//! and validates its CRUD workflows under an authenticated session. It never
//! sleeps for a fixed time: every step waits until its target element is
//! ready, then acts.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    WARDWALK Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Workflow   │    │ Wait       │    │ Locator    │            │
//! │   │ Executor   │───►│ (polling)  │───►│ Resolver   │───► Driver │
//! │   │            │    │            │    │            │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │     steps down ──►                 ◄── handles, readiness up   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use wardwalk::{catalog, Credentials, ExecutorConfig, SuiteRunner};
//! # async fn demo<F: wardwalk::SessionFactory>(factory: F) -> wardwalk::WardwalkResult<()> {
//! let credentials = Credentials::new("kasun@gmail.com", "12345678");
//! let scenarios = catalog::all(&credentials)?;
//! let runner = SuiteRunner::new(factory, ExecutorConfig::new("http://localhost:3000"));
//! let report = runner.run(&scenarios).await;
//! println!("{} passed, {} failed", report.passed(), report.failed());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod catalog;
#[cfg(feature = "browser")]
mod chromium;
mod config;
mod driver;
mod executor;
mod locator;
/// Scripted DOM timeline for tests
pub mod mock;
mod result;
mod scenario;
mod session;
mod suite;
mod wait;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumDriver, ChromiumSessionFactory};
pub use config::{BrowserOptions, HarnessConfig, ENV_BASE_URL, ENV_EMAIL, ENV_PASSWORD};
pub use driver::{BrowserDriver, DriverError, DriverResult, ElementHandle, ElementId};
pub use executor::{
    ActionError, ExecutorConfig, FailureCause, LoginFlow, ScenarioResult, ScenarioState,
    ScenarioStatus, StepOutcome, StepRecord, WorkflowExecutor,
};
pub use locator::{resolve, ElementReference, PathSyntax, Query, ReferenceKind, ResolveError};
pub use result::{WardwalkError, WardwalkResult};
pub use scenario::{
    load_definitions, Credentials, Scenario, ScenarioBuilder, ScenarioDefinition, Step, StepKind,
};
pub use session::{Session, SessionFactory};
pub use suite::{SuiteReport, SuiteRunner};
pub use wait::{
    Observation, Readiness, TimeoutError, WaitCondition, WaitError, WaitOptions, WaitResult,
    Waiter, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        BrowserDriver, Credentials, ElementReference, ExecutorConfig, HarnessConfig, Readiness,
        Scenario, ScenarioResult, Session, SessionFactory, Step, SuiteRunner, WaitOptions,
        WardwalkError, WardwalkResult, WorkflowExecutor,
    };
}
