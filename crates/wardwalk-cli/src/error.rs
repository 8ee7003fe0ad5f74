//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// At least one scenario did not complete
    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed {
        /// Failed or skipped scenarios
        failed: usize,
        /// Scenarios requested
        total: usize,
    },

    /// Logging could not be installed
    #[error("Logging setup failed: {message}")]
    Logging {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wardwalk library error
    #[error(transparent)]
    Wardwalk(#[from] wardwalk::WardwalkError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a logging setup error
    #[must_use]
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("no email");
        assert_eq!(err.to_string(), "Configuration error: no email");
    }

    #[test]
    fn test_scenarios_failed_message() {
        let err = CliError::ScenariosFailed {
            failed: 1,
            total: 3,
        };
        assert_eq!(err.to_string(), "1 of 3 scenarios failed");
    }

    #[test]
    fn test_library_error_is_transparent() {
        let err: CliError = wardwalk::WardwalkError::UnknownScenario {
            name: "nope".to_string(),
        }
        .into();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_from_io() {
        let err: CliError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, CliError::Io(_)));
    }
}
