//! Wait Mechanisms
//!
//! Predicate-based synchronization on top of the one-shot locator resolver.
//!
//! A [`Waiter`] polls at a fixed interval until the referenced element
//! satisfies a [`Readiness`] predicate (or, for [`Waiter::until_value`], holds
//! an expected value) or the timeout elapses. The first check happens
//! immediately; each sleep is capped by the remaining budget, so a timeout
//! is reported at the deadline, never more than one poll interval late.
//!
//! Absence ([`ResolveError::NotFound`]) and stale handles are ordinary poll
//! outcomes. Any other driver failure ends the wait at once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

use crate::driver::{BrowserDriver, DriverError, ElementHandle};
use crate::locator::{resolve, ElementReference, ResolveError};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

// =============================================================================
// READINESS
// =============================================================================

/// What an element must satisfy before a step may act on it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    /// Present in the DOM
    Exists,
    /// Present, rendered with non-zero size, not hidden by style
    #[default]
    Visible,
    /// Visible, enabled, and not covered by another element
    Clickable,
}

impl Readiness {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::Visible => "visible",
            Self::Clickable => "clickable",
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition a wait is trying to establish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "expected", rename_all = "snake_case")]
pub enum WaitCondition {
    /// Readiness predicate
    Ready(Readiness),
    /// Element value equals the given string
    Value(String),
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(readiness) => write!(f, "{readiness}"),
            Self::Value(expected) => write!(f, "holding value {expected:?}"),
        }
    }
}

/// Why the most recent poll did not satisfy the condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Observation {
    /// Nothing matched the reference
    NotFound,
    /// Present but not visible
    Hidden,
    /// Visible but disabled
    Disabled,
    /// Visible and enabled but covered by another element
    Obscured,
    /// Found, then detached before it could be inspected
    Stale,
    /// Present, but the value differs
    ValueMismatch {
        /// Value seen on the last poll
        actual: Option<String>,
    },
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not in the DOM"),
            Self::Hidden => f.write_str("present but hidden"),
            Self::Disabled => f.write_str("visible but disabled"),
            Self::Obscured => f.write_str("covered by another element"),
            Self::Stale => f.write_str("detached while being inspected"),
            Self::ValueMismatch { actual: Some(v) } => write!(f, "value was {v:?}"),
            Self::ValueMismatch { actual: None } => f.write_str("element has no value"),
        }
    }
}

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// A wait whose condition never held within its budget
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("timed out after {elapsed_ms}ms waiting for {reference} to be {condition} ({last_observation})")]
pub struct TimeoutError {
    /// Element being waited on
    pub reference: ElementReference,
    /// Condition that never held
    pub condition: WaitCondition,
    /// Time spent waiting
    pub elapsed_ms: u64,
    /// Outcome of the final poll
    pub last_observation: Observation,
}

/// Failure of a wait
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WaitError {
    /// Condition not reached in time
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The driver failed in a way polling cannot recover from
    #[error("waiting for {reference} failed: {source}")]
    Driver {
        /// Element being waited on
        reference: ElementReference,
        /// Underlying driver failure
        source: DriverError,
    },
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of a successful wait
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Handle to the element that satisfied the condition
    pub handle: ElementHandle,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of polls performed (at least 1)
    pub polls: u32,
}

enum Poll {
    Ready(ElementHandle),
    Pending(Observation),
}

// =============================================================================
// WAITER IMPLEMENTATION
// =============================================================================

/// Polls a driver until an element reaches a condition
#[derive(Debug, Clone, Copy)]
pub struct Waiter {
    poll_interval: Duration,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }
}

impl Waiter {
    /// Create a waiter polling at `poll_interval` (a zero interval is raised to 1ms)
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Create from options
    #[must_use]
    pub fn with_options(options: &WaitOptions) -> Self {
        Self::new(options.poll_interval())
    }

    /// Polling interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `reference` resolves to an element satisfying `readiness`
    pub async fn until_ready<D>(
        &self,
        driver: &mut D,
        reference: &ElementReference,
        readiness: Readiness,
        timeout: Duration,
    ) -> Result<WaitResult, WaitError>
    where
        D: BrowserDriver + ?Sized,
    {
        self.wait(driver, reference, WaitCondition::Ready(readiness), timeout)
            .await
    }

    /// Wait until `reference` resolves to an element whose value is `expected`
    pub async fn until_value<D>(
        &self,
        driver: &mut D,
        reference: &ElementReference,
        expected: &str,
        timeout: Duration,
    ) -> Result<WaitResult, WaitError>
    where
        D: BrowserDriver + ?Sized,
    {
        self.wait(
            driver,
            reference,
            WaitCondition::Value(expected.to_string()),
            timeout,
        )
        .await
    }

    async fn wait<D>(
        &self,
        driver: &mut D,
        reference: &ElementReference,
        condition: WaitCondition,
        timeout: Duration,
    ) -> Result<WaitResult, WaitError>
    where
        D: BrowserDriver + ?Sized,
    {
        let start = Instant::now();
        let mut polls = 0u32;

        loop {
            let elapsed = start.elapsed();
            polls += 1;

            let observation = match observe(driver, reference, &condition).await {
                Ok(Poll::Ready(handle)) => {
                    trace!(%reference, %condition, polls, "condition satisfied");
                    return Ok(WaitResult {
                        handle,
                        elapsed: start.elapsed(),
                        polls,
                    });
                }
                Ok(Poll::Pending(observation)) => observation,
                Err(e) if e.is_transient() => Observation::Stale,
                Err(source) => {
                    return Err(WaitError::Driver {
                        reference: reference.clone(),
                        source,
                    })
                }
            };

            if elapsed >= timeout {
                return Err(WaitError::Timeout(TimeoutError {
                    reference: reference.clone(),
                    condition,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    last_observation: observation,
                }));
            }

            trace!(%reference, %condition, %observation, polls, "not ready yet");
            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }
}

async fn observe<D>(
    driver: &mut D,
    reference: &ElementReference,
    condition: &WaitCondition,
) -> Result<Poll, DriverError>
where
    D: BrowserDriver + ?Sized,
{
    let handle = match resolve(driver, reference).await {
        Ok(handle) => handle,
        Err(ResolveError::NotFound { .. }) => return Ok(Poll::Pending(Observation::NotFound)),
        Err(ResolveError::Driver { source, .. }) => return Err(source),
    };

    let readiness = match condition {
        WaitCondition::Ready(readiness) => *readiness,
        WaitCondition::Value(expected) => {
            let actual = driver.value(&handle).await?;
            return Ok(if actual.as_deref() == Some(expected.as_str()) {
                Poll::Ready(handle)
            } else {
                Poll::Pending(Observation::ValueMismatch { actual })
            });
        }
    };

    if readiness == Readiness::Exists {
        return Ok(Poll::Ready(handle));
    }
    if !driver.is_visible(&handle).await? {
        return Ok(Poll::Pending(Observation::Hidden));
    }
    if readiness == Readiness::Visible {
        return Ok(Poll::Ready(handle));
    }
    if !driver.is_enabled(&handle).await? {
        return Ok(Poll::Pending(Observation::Disabled));
    }
    if driver.is_obscured(&handle).await? {
        return Ok(Poll::Pending(Observation::Obscured));
    }
    Ok(Poll::Ready(handle))
}

// =============================================================================
// TESTS
// =============================================================================
