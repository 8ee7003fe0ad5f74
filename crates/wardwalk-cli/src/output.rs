//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use wardwalk::{ScenarioResult, StepOutcome, SuiteReport};

/// Progress reporter for a suite run
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
    /// Print every step of each scenario
    pub show_steps: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
            show_steps: false,
        }
    }

    /// Print step records under each scenario line
    #[must_use]
    pub const fn with_steps(mut self, show_steps: bool) -> Self {
        self.show_steps = show_steps;
        self
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Finish and remove the progress bar
    pub fn finish(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_and_clear();
        }
    }

    fn line(&self, text: &str) {
        // keep the bar intact while printing above it
        match &self.progress_bar {
            Some(pb) => pb.suspend(|| {
                let _ = self.term.write_line(text);
            }),
            None => {
                let _ = self.term.write_line(text);
            }
        }
    }

    fn prefixed(&self, symbol: &str, plain: &str, color: &Style, message: &str) -> String {
        let prefix = if self.use_color {
            color.apply_to(symbol).bold().to_string()
        } else {
            plain.to_string()
        };
        format!("{prefix} {message}")
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefixed("✓", "PASS", &Style::new().green(), message));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        self.line(&self.prefixed("✗", "FAIL", &Style::new().red(), message));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefixed("⚠", "WARN", &Style::new().yellow(), message));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&self.prefixed("ℹ", "INFO", &Style::new().blue(), message));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        self.line("");
        self.line(&styled);
    }

    /// Report one finished scenario
    pub fn scenario(&self, result: &ScenarioResult) {
        let duration = format_duration(Duration::from_millis(result.duration_ms));
        if result.is_success() {
            self.success(&format!(
                "{} ({} steps, {duration})",
                result.scenario,
                result.steps.len()
            ));
        } else {
            self.failure(&scenario_failure(result));
        }
        if let Some(teardown) = &result.teardown_error {
            self.warning(&format!("{}: teardown failed: {teardown}", result.scenario));
        }
        if self.show_steps && !self.quiet {
            for step in &result.steps {
                let mark = match step.outcome {
                    StepOutcome::Passed => "ok",
                    StepOutcome::Failed => "failed",
                    StepOutcome::Cancelled => "cancelled",
                };
                self.line(&format!(
                    "    [{:>2}] {:<9} {} ({}ms)",
                    step.index, mark, step.label, step.elapsed_ms
                ));
            }
        }
    }

    /// Print suite summary
    pub fn summary(&self, report: &SuiteReport) {
        let passed = report.passed();
        let failed = report.failed();
        let skipped = report.skipped.len();
        if self.quiet && failed == 0 && skipped == 0 {
            return;
        }

        let reason = if report.cancelled {
            "interrupted"
        } else {
            "fail-fast"
        };
        for name in &report.skipped {
            self.warning(&format!("{name} skipped ({reason})"));
        }

        self.line("");

        let total = passed + failed + skipped;
        let duration = format_duration(Duration::from_millis(report.duration_ms));

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let skipped_style = Style::new().yellow();

            let status = if report.is_success() {
                passed_style.apply_to("PASSED")
            } else {
                failed_style.apply_to("FAILED")
            };

            self.line(&format!(
                "{} {} scenarios in {} ({} passed, {} failed, {} skipped)",
                status,
                total,
                duration,
                passed_style.apply_to(passed),
                if failed > 0 {
                    failed_style.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
                skipped_style.apply_to(skipped)
            ));
        } else {
            let status = if report.is_success() {
                "PASSED"
            } else {
                "FAILED"
            };
            self.line(&format!(
                "{status} {total} scenarios in {duration} ({passed} passed, {failed} failed, {skipped} skipped)"
            ));
        }
    }
}

/// One-line failure description: name, failing step and cause
#[must_use]
pub fn scenario_failure(result: &ScenarioResult) -> String {
    let step = match result.failed_step {
        Some(0) => "login".to_string(),
        Some(index) => {
            let label = result
                .steps
                .iter()
                .find(|s| s.index == index)
                .map(|s| format!(" \"{}\"", s.label))
                .unwrap_or_default();
            format!("step {index}{label}")
        }
        None => "unknown step".to_string(),
    };
    let cause = result
        .cause
        .as_ref()
        .map_or_else(|| "failed".to_string(), ToString::to_string);
    format!("{} at {step}: {cause}", result.scenario)
}

/// Format duration for display
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60.0 {
        format!("{secs:.2}s")
    } else {
        let mins = duration.as_secs() / 60;
        let secs = duration.as_secs() % 60;
        format!("{mins}m {secs}s")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wardwalk::{ScenarioState, ScenarioStatus, StepKind, StepRecord};

    fn failed_at(step: usize) -> ScenarioResult {
        let mut result = ScenarioResult::not_started("appointment-crud", "boom");
        result.failed_step = Some(step);
        result.steps = vec![StepRecord {
            index: 3,
            label: "select first doctor".to_string(),
            kind: StepKind::SelectOption,
            elapsed_ms: 10_000,
            outcome: StepOutcome::Failed,
        }];
        result
    }

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = ProgressReporter::new(true, false);
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
            assert!(!reporter.show_steps);
        }

        #[test]
        fn test_quiet_reporter_has_no_bar() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start_progress(3, "running");
            assert!(reporter.progress_bar.is_none());
            reporter.increment(1);
            reporter.finish();
        }

        #[test]
        fn test_scenario_lines() {
            let reporter = ProgressReporter::new(false, false).with_steps(true);
            reporter.scenario(&failed_at(3));
            let mut done = failed_at(3);
            done.status = ScenarioStatus::Completed;
            done.failed_step = None;
            done.cause = None;
            done.transitions = vec![ScenarioState::Completed];
            reporter.scenario(&done);
        }
    }

    mod failure_line_tests {
        use super::*;

        #[test]
        fn test_names_the_failing_step() {
            let line = scenario_failure(&failed_at(3));
            assert!(line.starts_with("appointment-crud at step 3 \"select first doctor\""));
            assert!(line.contains("boom"));
        }

        #[test]
        fn test_step_zero_is_login() {
            let line = scenario_failure(&failed_at(0));
            assert!(line.contains("at login"));
        }
    }

    mod format_duration_tests {
        use super::*;

        #[test]
        fn test_milliseconds() {
            assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        }

        #[test]
        fn test_seconds() {
            assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        }

        #[test]
        fn test_minutes() {
            assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        }
    }
}
