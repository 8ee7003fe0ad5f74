//! Result and error types for Wardwalk.
//!
//! Scenario-level failures (timeouts, action failures, cancellation) are not
//! errors of the library itself: they are reported inside a
//! [`ScenarioResult`](crate::ScenarioResult). [`WardwalkError`] covers what
//! happens around a run: bad configuration, invalid scenario definitions,
//! sessions that cannot be opened.

use thiserror::Error;

use crate::driver::DriverError;

/// Result type for Wardwalk operations
pub type WardwalkResult<T> = Result<T, WardwalkError>;

/// Errors that can occur in Wardwalk
#[derive(Debug, Error)]
pub enum WardwalkError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Scenario definition rejected by validation
    #[error("Invalid scenario '{scenario}': {message}")]
    InvalidScenario {
        /// Scenario name
        scenario: String,
        /// What is wrong with it
        message: String,
    },

    /// No built-in scenario with that name
    #[error("Unknown scenario: {name}")]
    UnknownScenario {
        /// Requested name
        name: String,
    },

    /// Browser session could not be opened
    #[error("Failed to open browser session: {message}")]
    SessionOpen {
        /// Error message
        message: String,
    },

    /// Driver error outside of a scenario run
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl WardwalkError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a scenario validation error
    #[must_use]
    pub fn invalid_scenario(scenario: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidScenario {
            scenario: scenario.into(),
            message: message.into(),
        }
    }

    /// Create a session-open error
    #[must_use]
    pub fn session_open(message: impl Into<String>) -> Self {
        Self::SessionOpen {
            message: message.into(),
        }
    }
}
