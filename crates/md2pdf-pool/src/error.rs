//! Job-level and pool-level errors.

use std::path::PathBuf;
use std::time::Duration;

/// Semantic error categories for a single job attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Diagram renderer rejected the source.
    Render,
    /// Document compiler failed.
    Compile,
    /// Attempt exceeded its time limit.
    Timeout,
    /// Batch was cancelled while the job was running.
    Cancelled,
    /// Filesystem or process I/O failed.
    Io,
    /// Worker task panicked.
    Internal,
}

/// Retry guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    /// Don't retry (malformed input, missing tool, cancellation).
    #[default]
    Permanent,
    /// Retry with backoff (timeout, transient I/O).
    Temporary,
}

impl ErrorKind {
    /// Default retry guidance for this kind.
    #[must_use]
    pub fn default_status(self) -> ErrorStatus {
        match self {
            Self::Timeout | Self::Io => ErrorStatus::Temporary,
            Self::Render | Self::Compile | Self::Cancelled | Self::Internal => {
                ErrorStatus::Permanent
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Render => "Render failed",
            Self::Compile => "Compile failed",
            Self::Timeout => "Timed out",
            Self::Cancelled => "Cancelled",
            Self::Io => "I/O error",
            Self::Internal => "Internal error",
        }
    }
}

/// Error produced by one job attempt.
///
/// Carries the semantic [`ErrorKind`], retry guidance and optional context.
/// Status defaults from the kind and can be overridden, e.g. an I/O error for
/// a missing executable is permanent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobError {
    /// Semantic error category.
    pub kind: ErrorKind,
    /// Retry guidance.
    pub status: ErrorStatus,
    /// Human-readable detail (tool stderr, I/O message).
    pub message: String,
    /// Path context (if applicable).
    pub path: Option<PathBuf>,
    /// External tool involved (e.g. "mmdc", "pandoc").
    pub tool: Option<&'static str>,
}

impl JobError {
    /// Create a job error with the kind's default status.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: kind.default_status(),
            message: message.into(),
            path: None,
            tool: None,
        }
    }

    /// Attach path context.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach tool identifier.
    #[must_use]
    pub fn with_tool(mut self, tool: &'static str) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Override retry status.
    #[must_use]
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn render(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Render, message)
    }

    #[must_use]
    pub fn compile(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Compile, message)
    }

    /// Attempt ran longer than `limit`.
    #[must_use]
    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("exceeded {:.1}s", limit.as_secs_f64()),
        )
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "batch cancelled")
    }

    /// Create a job error from an I/O error.
    ///
    /// `NotFound` and `PermissionDenied` are permanent, everything else is
    /// worth another attempt.
    #[must_use]
    pub fn io(err: &std::io::Error, path: Option<PathBuf>) -> Self {
        let status = match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorStatus::Permanent
            }
            _ => ErrorStatus::Temporary,
        };
        let mut error = Self::new(ErrorKind::Io, err.to_string()).with_status(status);
        error.path = path;
        error
    }

    /// Whether the pool may schedule another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status == ErrorStatus::Temporary
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[tool] Kind: message (path: /foo/bar)"
        if let Some(tool) = self.tool {
            write!(f, "[{tool}] ")?;
        }

        write!(f, "{}", self.kind.label())?;

        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }

        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }

        Ok(())
    }
}

impl std::error::Error for JobError {}

/// Configuration errors, raised before any job runs.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PoolError {
    #[error("max_workers must be at least 1, got {0}")]
    InvalidWorkerCount(usize),
    #[error("job timeout must be greater than zero")]
    ZeroTimeout,
    #[error("retry backoff factor must be finite and >= 1.0, got {0}")]
    InvalidBackoff(f64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_status_per_kind() {
        assert_eq!(ErrorKind::Timeout.default_status(), ErrorStatus::Temporary);
        assert_eq!(ErrorKind::Io.default_status(), ErrorStatus::Temporary);
        assert_eq!(ErrorKind::Render.default_status(), ErrorStatus::Permanent);
        assert_eq!(ErrorKind::Compile.default_status(), ErrorStatus::Permanent);
        assert_eq!(ErrorKind::Cancelled.default_status(), ErrorStatus::Permanent);
    }

    #[test]
    fn test_job_error_builders() {
        let err = JobError::render("Parse error on line 2")
            .with_tool("mmdc")
            .with_path("/docs/a.md");

        assert_eq!(err.kind, ErrorKind::Render);
        assert_eq!(err.status, ErrorStatus::Permanent);
        assert_eq!(err.tool, Some("mmdc"));
        assert_eq!(err.path.as_deref(), Some(Path::new("/docs/a.md")));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_job_error_io_not_found_is_permanent() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = JobError::io(&io_err, Some(PathBuf::from("/usr/bin/pandoc")));

        assert_eq!(err.kind, ErrorKind::Io);
        assert_eq!(err.status, ErrorStatus::Permanent);
    }

    #[test]
    fn test_job_error_io_other_is_temporary() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = JobError::io(&io_err, None);

        assert!(err.is_retryable());
    }

    #[test]
    fn test_job_error_timeout_is_retryable() {
        let err = JobError::timeout(Duration::from_secs(1));

        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Timed out: exceeded 1.0s");
    }

    #[test]
    fn test_job_error_display_full() {
        let err = JobError::compile("! Undefined control sequence.")
            .with_tool("pandoc")
            .with_path("/docs/guide.md");

        assert_eq!(
            err.to_string(),
            "[pandoc] Compile failed: ! Undefined control sequence. (path: /docs/guide.md)"
        );
    }

    #[test]
    fn test_job_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JobError>();
    }
}
