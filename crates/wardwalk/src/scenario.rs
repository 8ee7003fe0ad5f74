//! Scenario definitions.
//!
//! A [`Scenario`] is an ordered list of [`Step`]s plus the credentials the
//! login sub-scenario authenticates with. Scenarios are data: build them in
//! Rust with [`ScenarioBuilder`] or load them from YAML with
//! [`load_definitions`].
//!
//! ```yaml
//! name: appointment-crud
//! steps:
//!   - kind: click
//!     target: { by: id, value: schedule-appointment-button }
//!   - kind: type-text
//!     target: { by: id, value: purpose }
//!     payload: Test purpose
//!   - kind: click
//!     target: { by: text, tag: button, value: Schedule Appointment }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::locator::ElementReference;
use crate::result::{WardwalkError, WardwalkResult};
use crate::wait::{Readiness, WaitOptions};

/// What a step does once its target is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// Load a URL, then optionally wait for a target
    Navigate,
    /// Clear the target, type the payload, observe the value
    TypeText,
    /// Click the target
    Click,
    /// Click an option of an open list
    SelectOption,
    /// Wait for the target and do nothing else
    WaitOnly,
}

impl StepKind {
    /// Kebab-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::TypeText => "type-text",
            Self::Click => "click",
            Self::SelectOption => "select-option",
            Self::WaitOnly => "wait-only",
        }
    }

    /// Predicate used when a step does not name one
    #[must_use]
    pub const fn default_readiness(&self) -> Readiness {
        match self {
            Self::Navigate => Readiness::Exists,
            Self::Click => Readiness::Clickable,
            Self::TypeText | Self::SelectOption | Self::WaitOnly => Readiness::Visible,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const fn default_true() -> bool {
    true
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_true(value: &bool) -> bool {
    *value
}

/// One unit of scenario work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Action performed
    pub kind: StepKind,
    /// Human-readable label for logs and results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Element the step waits on and acts on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ElementReference>,
    /// URL for navigate, text for type-text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Readiness required before acting; defaults by kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Readiness>,
    /// Wait budget for this step (None = the executor's default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Type-text only: wait for the field to hold the payload after typing
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub verify_value: bool,
}

impl Step {
    fn new(kind: StepKind) -> Self {
        Self {
            kind,
            label: None,
            target: None,
            payload: None,
            predicate: None,
            timeout_ms: None,
            verify_value: true,
        }
    }

    /// Load `url` (paths starting with `/` are joined to the base URL)
    #[must_use]
    pub fn navigate(url: impl Into<String>) -> Self {
        let mut step = Self::new(StepKind::Navigate);
        step.payload = Some(url.into());
        step
    }

    /// Type `text` into `target`
    #[must_use]
    pub fn type_text(target: ElementReference, text: impl Into<String>) -> Self {
        let mut step = Self::new(StepKind::TypeText);
        step.target = Some(target);
        step.payload = Some(text.into());
        step
    }

    /// Click `target` once it is clickable
    #[must_use]
    pub fn click(target: ElementReference) -> Self {
        Self::new(StepKind::Click).with_target(target)
    }

    /// Click the list option `target` once it is visible
    #[must_use]
    pub fn select_option(target: ElementReference) -> Self {
        Self::new(StepKind::SelectOption).with_target(target)
    }

    /// Wait for `target` to be visible
    #[must_use]
    pub fn wait_for(target: ElementReference) -> Self {
        Self::new(StepKind::WaitOnly).with_target(target)
    }

    /// Set the label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the target
    #[must_use]
    pub fn with_target(mut self, target: ElementReference) -> Self {
        self.target = Some(target);
        self
    }

    /// Override the readiness predicate
    #[must_use]
    pub const fn with_predicate(mut self, predicate: Readiness) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Set the wait budget in milliseconds
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Skip the post-typing value check (widgets that reformat their value)
    #[must_use]
    pub const fn without_value_check(mut self) -> Self {
        self.verify_value = false;
        self
    }

    /// Effective readiness predicate
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.predicate
            .unwrap_or_else(|| self.kind.default_readiness())
    }

    /// Wait budget: the step's own, else `defaults`
    #[must_use]
    pub fn effective_timeout(&self, defaults: &WaitOptions) -> Duration {
        self.timeout_ms
            .map_or_else(|| defaults.timeout(), Duration::from_millis)
    }

    /// Label, or a description derived from kind and target
    #[must_use]
    pub fn describe(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        match (&self.target, &self.payload) {
            (_, Some(url)) if self.kind == StepKind::Navigate => format!("navigate {url}"),
            (Some(target), _) => format!("{} {target}", self.kind),
            (None, _) => self.kind.to_string(),
        }
    }

    fn check(&self) -> Result<(), String> {
        if self.timeout_ms == Some(0) {
            return Err("timeout must be greater than zero".to_string());
        }
        let needs_payload = matches!(self.kind, StepKind::Navigate | StepKind::TypeText);
        if needs_payload && self.payload.is_none() {
            return Err(format!("{} step needs a payload", self.kind));
        }
        if self.kind != StepKind::Navigate && self.target.is_none() {
            return Err(format!("{} step needs a target", self.kind));
        }
        Ok(())
    }
}

/// Login credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A validated, immutable workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    name: String,
    description: Option<String>,
    credentials: Credentials,
    steps: Vec<Step>,
}

impl Scenario {
    /// Start building a scenario
    #[must_use]
    pub fn builder(name: impl Into<String>, credentials: Credentials) -> ScenarioBuilder {
        ScenarioBuilder {
            name: name.into(),
            description: None,
            credentials,
            steps: Vec::new(),
        }
    }

    /// Scenario name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional description
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Credentials for the login sub-scenario
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Check the scenario is runnable
    pub fn validate(&self) -> WardwalkResult<()> {
        if self.name.trim().is_empty() {
            return Err(WardwalkError::invalid_scenario("", "name is empty"));
        }
        for (i, step) in self.steps.iter().enumerate() {
            step.check().map_err(|message| {
                WardwalkError::invalid_scenario(&self.name, format!("step {}: {message}", i + 1))
            })?;
        }
        Ok(())
    }

    /// Serializable form, without credentials
    #[must_use]
    pub fn to_definition(&self) -> ScenarioDefinition {
        ScenarioDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            credentials: None,
            steps: self.steps.clone(),
        }
    }
}

/// Builder for [`Scenario`]
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    name: String,
    description: Option<String>,
    credentials: Credentials,
    steps: Vec<Step>,
}

impl ScenarioBuilder {
    /// Set the description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Open a list by clicking `trigger`, then pick its first option
    #[must_use]
    pub fn select_first(self, trigger: ElementReference, label: &str) -> Self {
        self.step(Step::click(trigger).with_label(format!("open {label}")))
            .pick_first(label)
    }

    /// Pick the first option of a list that is already open
    #[must_use]
    pub fn pick_first(self, label: &str) -> Self {
        self.step(
            Step::select_option(ElementReference::first_option())
                .with_label(format!("select first {label}")),
        )
    }

    /// Validate and build
    pub fn build(self) -> WardwalkResult<Scenario> {
        let scenario = Scenario {
            name: self.name,
            description: self.description,
            credentials: self.credentials,
            steps: self.steps,
        };
        scenario.validate()?;
        Ok(scenario)
    }
}

/// On-disk scenario form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    /// Scenario name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Credentials; the configured ones are used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    /// Steps
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl ScenarioDefinition {
    /// Validate into a runnable scenario
    pub fn into_scenario(self, fallback: &Credentials) -> WardwalkResult<Scenario> {
        let credentials = self.credentials.unwrap_or_else(|| fallback.clone());
        let scenario = Scenario {
            name: self.name,
            description: self.description,
            credentials,
            steps: self.steps,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> WardwalkResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionFile {
    Many { scenarios: Vec<ScenarioDefinition> },
    One(ScenarioDefinition),
}

/// Parse a YAML document holding one scenario or a `scenarios:` list
pub fn load_definitions(yaml: &str) -> WardwalkResult<Vec<ScenarioDefinition>> {
    match serde_yaml_ng::from_str(yaml)? {
        DefinitionFile::Many { scenarios } => Ok(scenarios),
        DefinitionFile::One(definition) => Ok(vec![definition]),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("admin@hospital.test", "s3cret")
    }

    mod step_tests {
        use super::*;

        #[test]
        fn test_default_readiness_by_kind() {
            assert_eq!(
                Step::click(ElementReference::id("b")).readiness(),
                Readiness::Clickable
            );
            assert_eq!(
                Step::type_text(ElementReference::id("f"), "x").readiness(),
                Readiness::Visible
            );
            assert_eq!(Step::navigate("/login").readiness(), Readiness::Exists);
            assert_eq!(
                Step::select_option(ElementReference::first_option()).readiness(),
                Readiness::Visible
            );
        }

        #[test]
        fn test_explicit_predicate_wins() {
            let step = Step::wait_for(ElementReference::id("list")).with_predicate(Readiness::Exists);
            assert_eq!(step.readiness(), Readiness::Exists);
        }

        #[test]
        fn test_describe_prefers_label() {
            let step = Step::click(ElementReference::tagged_text("button", "Delete"));
            assert_eq!(step.describe(), r#"click button "Delete""#);
            assert_eq!(step.with_label("confirm delete").describe(), "confirm delete");
            assert_eq!(Step::navigate("/patients").describe(), "navigate /patients");
        }

        #[test]
        fn test_yaml_defaults() {
            let step: Step = serde_yaml_ng::from_str(
                "{ kind: type-text, target: { by: id, value: purpose }, payload: Test purpose }",
            )
            .unwrap();
            assert_eq!(step.timeout_ms, None);
            assert_eq!(
                step.effective_timeout(&WaitOptions::new().with_timeout(500)),
                Duration::from_millis(500)
            );
            assert!(step.verify_value);
            assert_eq!(step.predicate, None);
        }

        #[test]
        fn test_value_check_opt_out_round_trips() {
            let step = Step::type_text(ElementReference::id("appointment-time"), "14:30")
                .without_value_check();
            let yaml = serde_yaml_ng::to_string(&step).unwrap();
            assert!(yaml.contains("verify_value: false"));
            let back: Step = serde_yaml_ng::from_str(&yaml).unwrap();
            assert!(!back.verify_value);
        }
    }

    mod validation_tests {
        use super::*;

        fn build(step: Step) -> WardwalkResult<Scenario> {
            Scenario::builder("s", creds()).step(step).build()
        }

        #[test]
        fn test_valid_scenario() {
            let scenario = Scenario::builder("appointment-crud", creds())
                .step(Step::click(ElementReference::id("schedule-appointment-button")))
                .select_first(ElementReference::id("patient-select"), "patient")
                .build()
                .unwrap();
            assert_eq!(scenario.steps().len(), 3);
            assert_eq!(scenario.steps()[2].kind, StepKind::SelectOption);
            assert_eq!(
                scenario.steps()[2].target,
                Some(ElementReference::first_option())
            );
        }

        #[test]
        fn test_empty_name_rejected() {
            assert!(Scenario::builder("  ", creds()).build().is_err());
        }

        #[test]
        fn test_missing_target_rejected() {
            let mut step = Step::click(ElementReference::id("x"));
            step.target = None;
            let err = build(step).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Invalid scenario 's': step 1: click step needs a target"
            );
        }

        #[test]
        fn test_missing_payload_rejected() {
            let mut step = Step::navigate("/");
            step.payload = None;
            assert!(build(step).is_err());

            let mut step = Step::type_text(ElementReference::id("f"), "x");
            step.payload = None;
            assert!(build(step).is_err());
        }

        #[test]
        fn test_zero_timeout_rejected() {
            assert!(build(Step::wait_for(ElementReference::id("x")).with_timeout_ms(0)).is_err());
        }

        #[test]
        fn test_navigate_without_target_is_fine() {
            assert!(build(Step::navigate("/lab-reports/create")).is_ok());
        }
    }

    mod definition_tests {
        use super::*;

        const SINGLE: &str = r"
name: lab-report
steps:
  - kind: navigate
    payload: /lab-reports/create
  - kind: click
    label: submit
    target: { by: text, tag: button, value: Create Report }
    timeout_ms: 5000
";

        #[test]
        fn test_single_document() {
            let defs = load_definitions(SINGLE).unwrap();
            assert_eq!(defs.len(), 1);
            let scenario = defs[0].clone().into_scenario(&creds()).unwrap();
            assert_eq!(scenario.name(), "lab-report");
            assert_eq!(scenario.credentials(), &creds());
            assert_eq!(scenario.steps()[1].timeout_ms, Some(5000));
            assert_eq!(
                scenario.steps()[1].effective_timeout(&WaitOptions::default()),
                Duration::from_millis(5000)
            );
        }

        #[test]
        fn test_list_document_with_own_credentials() {
            let yaml = r"
scenarios:
  - name: a
    credentials: { email: doc@hospital.test, password: pw }
    steps: []
  - name: b
";
            let defs = load_definitions(yaml).unwrap();
            assert_eq!(defs.len(), 2);
            let a = defs[0].clone().into_scenario(&creds()).unwrap();
            assert_eq!(a.credentials().email, "doc@hospital.test");
        }

        #[test]
        fn test_invalid_definition_rejected() {
            let yaml = "name: bad\nsteps:\n  - kind: click\n";
            let defs = load_definitions(yaml).unwrap();
            assert!(defs[0].clone().into_scenario(&creds()).is_err());
        }

        #[test]
        fn test_to_definition_drops_credentials() {
            let scenario = load_definitions(SINGLE).unwrap()[0]
                .clone()
                .into_scenario(&creds())
                .unwrap();
            let yaml = scenario.to_definition().to_yaml().unwrap();
            assert!(!yaml.contains("s3cret"));
            assert_eq!(load_definitions(&yaml).unwrap()[0], scenario.to_definition());
        }

        #[test]
        fn test_credentials_debug_redacts_password() {
            let debug = format!("{:?}", creds());
            assert!(debug.contains("admin@hospital.test"));
            assert!(!debug.contains("s3cret"));
        }
    }
}
