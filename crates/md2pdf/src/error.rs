//! CLI error types.

use md2pdf_config::ConfigError;
use md2pdf_convert::ToolError;
use md2pdf_pipeline::PipelineError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("{0}")]
    Tool(#[from] ToolError),

    #[error("{0}")]
    Validation(String),

    /// Batch finished but some jobs did not succeed.
    #[error("{failed} of {total} file(s) not converted")]
    JobsFailed { failed: usize, total: usize },

    #[error("missing dependencies: {0}")]
    MissingDependencies(String),
}
