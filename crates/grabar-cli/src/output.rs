//! Output formatting and progress reporting

use console::{style, Term};
use grabar::{HealthStatus, RunStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for pipeline commands
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
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
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Print an informational line
    pub fn info(&self, message: &str) {
        if !self.quiet {
            let _ = self.term.write_line(message);
        }
    }

    /// Print a success line
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let line = if self.use_color {
            format!("{} {message}", style("✓").green().bold())
        } else {
            format!("ok: {message}")
        };
        let _ = self.term.write_line(&line);
    }

    /// Print an error line (always, even in quiet mode)
    pub fn error(&self, message: &str) {
        let line = if self.use_color {
            format!("{} {message}", style("✗").red().bold())
        } else {
            format!("error: {message}")
        };
        let _ = self.term.write_line(&line);
    }

    /// Start an indeterminate spinner
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    /// Stop the spinner, leaving a final message
    pub fn finish_spinner(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(message.to_string());
        }
    }

    /// Render a run status with its conventional color
    #[must_use]
    pub fn status_label(&self, status: RunStatus) -> String {
        if !self.use_color {
            return format!("{status:?}");
        }
        let styled = match status {
            RunStatus::Passed => style("Passed").green(),
            RunStatus::Failed => style("Failed").red(),
            RunStatus::Cancelled => style("Cancelled").yellow(),
            RunStatus::Skipped => style("Skipped").dim(),
            RunStatus::Pending | RunStatus::Running => style("Running").cyan(),
        };
        styled.bold().to_string()
    }

    /// Render a locator health status with its conventional color
    #[must_use]
    pub fn health_label(&self, status: HealthStatus) -> String {
        if !self.use_color {
            return format!("{status:?}");
        }
        let styled = match status {
            HealthStatus::Healthy => style("Healthy").green(),
            HealthStatus::Warning => style("Warning").yellow(),
            HealthStatus::Failing => style("Failing").red(),
        };
        styled.to_string()
    }
}
