//! Log subscriber setup
//!
//! Logs go to stderr; stdout carries listings and YAML only.
//! `RUST_LOG` wins over the level derived from `-v`/`-q`. At `-vv` each
//! event also names its source file and line.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, Verbosity};
use crate::error::{CliError, CliResult};

/// Filter from `RUST_LOG`, falling back to the verbosity level
pub fn filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()))
}

/// Whether events carry their source location
#[must_use]
pub const fn with_source(verbosity: Verbosity) -> bool {
    verbosity.is_debug()
}

/// Install the global subscriber
pub fn init(verbosity: Verbosity, format: LogFormat) -> CliResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity))
        .with_file(with_source(verbosity))
        .with_line_number(with_source(verbosity))
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| CliError::logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_locations_only_at_debug() {
        assert!(with_source(Verbosity::Debug));
        assert!(!with_source(Verbosity::Verbose));
        assert!(!with_source(Verbosity::Normal));
        assert!(!with_source(Verbosity::Quiet));
    }
}
