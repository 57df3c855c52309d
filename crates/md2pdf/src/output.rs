//! Colored terminal output utilities.

use std::time::Duration;

use console::{Style, Term};
use md2pdf_pool::{BatchResult, Completion, Progress};

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
        }
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print a highlighted message (cyan bold).
    pub(crate) fn highlight(&self, msg: &str) {
        let _ = self
            .term
            .write_line(&self.cyan_bold.apply_to(msg).to_string());
    }

    /// Print a separator line.
    pub(crate) fn separator(&self) {
        let _ = self.term.write_line(&"=".repeat(70));
    }

    /// Print one progress line per completed job.
    pub(crate) fn progress(&self, progress: Progress<'_>) {
        let counter = format!("[{}/{}]", progress.completed, progress.total);
        match progress.completion {
            Completion::Succeeded => self.success(&format!("{counter} ok      {}", progress.job)),
            Completion::Failed(err) => {
                self.error(&format!("{counter} failed  {}: {err}", progress.job));
            }
            Completion::Cancelled => {
                self.warning(&format!("{counter} skipped {}", progress.job));
            }
        }
    }

    /// Print the batch summary with one line per failure.
    pub(crate) fn summary<T>(&self, result: &BatchResult<T>) {
        self.separator();
        self.highlight(&format!(
            "Converted {} of {} file(s) in {}",
            result.success_count(),
            result.total(),
            format_duration(result.duration)
        ));
        self.info(&format!("  Succeeded: {}", result.success_count()));
        self.info(&format!("  Failed:    {}", result.failure_count()));
        self.info(&format!("  Cancelled: {}", result.cancelled_count()));

        if result.failure_count() > 0 {
            self.info("");
            self.error("Failures:");
            for (job, err) in result.failures() {
                self.error(&format!("  {job}: {err}"));
            }
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        format!("{}m {}s", duration.as_secs() / 60, duration.as_secs() % 60)
    }
}
