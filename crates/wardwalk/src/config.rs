//! Harness configuration.
//!
//! Layered: built-in defaults, then a YAML file, then environment
//! variables. Command-line flags are applied on top by the CLI.
//!
//! ```yaml
//! base_url: http://localhost:3000
//! credentials: { email: kasun@gmail.com, password: "12345678" }
//! wait: { timeout_ms: 10000, poll_interval_ms: 100 }
//! browser: { headless: true, sandbox: false }
//! scenario_timeout_ms: 120000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::executor::{ExecutorConfig, LoginFlow};
use crate::result::{WardwalkError, WardwalkResult};
use crate::scenario::Credentials;
use crate::wait::WaitOptions;

/// Base URL override
pub const ENV_BASE_URL: &str = "WARDWALK_BASE_URL";
/// Login email override
pub const ENV_EMAIL: &str = "WARDWALK_EMAIL";
/// Login password override
pub const ENV_PASSWORD: &str = "WARDWALK_PASSWORD";

/// Browser launch options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Path to the chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Chromium sandbox (disable inside containers)
    pub sandbox: bool,
    /// Window width
    pub viewport_width: u32,
    /// Window height
    pub viewport_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            viewport_width: 1280,
            viewport_height: 800,
        }
    }
}

/// Everything needed to run scenarios against a deployment
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Application root
    pub base_url: String,
    /// Login credentials for scenarios that do not carry their own
    pub credentials: Credentials,
    /// Wait defaults
    pub wait: WaitOptions,
    /// Login sub-scenario
    pub login: LoginFlow,
    /// Browser launch options
    pub browser: BrowserOptions,
    /// Cancel a scenario after this long (None = no limit)
    pub scenario_timeout_ms: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            credentials: Credentials::new("", ""),
            wait: WaitOptions::default(),
            login: LoginFlow::default(),
            browser: BrowserOptions::default(),
            scenario_timeout_ms: None,
        }
    }
}

impl std::fmt::Debug for HarnessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("wait", &self.wait)
            .field("browser", &self.browser)
            .field("scenario_timeout_ms", &self.scenario_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl HarnessConfig {
    /// Parse from YAML
    pub fn from_yaml(yaml: &str) -> WardwalkResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> WardwalkResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            WardwalkError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Apply `WARDWALK_*` environment overrides
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment, in practice)
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(email) = lookup(ENV_EMAIL) {
            self.credentials.email = email;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.credentials.password = password;
        }
        self
    }

    /// Check the configuration can drive a run
    pub fn validate(&self) -> WardwalkResult<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(WardwalkError::config(format!(
                "base_url must be http(s), got {:?}",
                self.base_url
            )));
        }
        if self.credentials.email.is_empty() {
            return Err(WardwalkError::config(format!(
                "no login email configured (set {ENV_EMAIL} or credentials.email)"
            )));
        }
        if self.wait.timeout_ms == 0 || self.wait.poll_interval_ms == 0 {
            return Err(WardwalkError::config(
                "wait timeout and poll interval must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Executor settings derived from this configuration
    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::new(self.base_url.clone())
            .with_wait(self.wait)
            .with_login(self.login.clone())
    }

    /// Per-scenario cancellation deadline
    #[must_use]
    pub fn scenario_timeout(&self) -> Option<Duration> {
        self.scenario_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid() -> HarnessConfig {
        HarnessConfig {
            credentials: Credentials::new("kasun@gmail.com", "12345678"),
            ..HarnessConfig::default()
        }
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = HarnessConfig::from_yaml("base_url: http://staging:3000\n").unwrap();
        assert_eq!(config.base_url, "http://staging:3000");
        assert_eq!(config.wait, WaitOptions::default());
        assert!(config.browser.headless);
        assert_eq!(config.login, LoginFlow::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "credentials: {{ email: a@b.c, password: pw }}\nwait: {{ timeout_ms: 3000 }}\nbrowser: {{ sandbox: false }}"
        )
        .unwrap();

        let config = HarnessConfig::from_file(file.path()).unwrap();
        assert_eq!(config.credentials.email, "a@b.c");
        assert_eq!(config.wait.timeout_ms, 3000);
        assert_eq!(config.wait.poll_interval_ms, 100);
        assert!(!config.browser.sandbox);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = HarnessConfig::from_file("/nonexistent/wardwalk.yaml").unwrap_err();
        assert!(matches!(err, WardwalkError::Config { .. }));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "https://hms.example"),
            (ENV_PASSWORD, "from-env"),
        ]
        .into_iter()
        .collect();
        let config = valid().with_overrides(|k| env.get(k).map(ToString::to_string));
        assert_eq!(config.base_url, "https://hms.example");
        assert_eq!(config.credentials.email, "kasun@gmail.com");
        assert_eq!(config.credentials.password, "from-env");
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());
        assert!(HarnessConfig::default().validate().is_err());

        let mut bad = valid();
        bad.base_url = "localhost:3000".to_string();
        assert!(bad.validate().is_err());

        let mut bad = valid();
        bad.wait.poll_interval_ms = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_executor_config() {
        let mut config = valid();
        config.wait = WaitOptions::new().with_timeout(4_000);
        let exec = config.executor_config();
        assert_eq!(exec.base_url, config.base_url);
        assert_eq!(exec.wait.timeout_ms, 4_000);
        assert_eq!(config.scenario_timeout(), None);
    }

    #[test]
    fn test_debug_hides_password() {
        assert!(!format!("{:?}", valid()).contains("12345678"));
    }
}
