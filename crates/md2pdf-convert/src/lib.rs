//! External collaborators of the md2pdf pipeline.
//!
//! This crate wraps the tools a conversion needs and the document plumbing
//! around them:
//!
//! - [`MermaidRenderer`]: renders one diagram source with `mmdc`
//! - [`PandocCompiler`]: compiles a Markdown file to PDF with `pandoc`
//! - [`extract_diagrams`] / [`substitute_diagrams`]: find Mermaid fences and
//!   replace them with image references
//! - [`DocumentMetadata`]: title extraction
//! - [`FileMatcher`]: input file discovery
//! - [`probe`]: dependency check for `md2pdf doctor`
//!
//! The renderer and compiler sit behind the [`DiagramRenderer`] and
//! [`DocumentCompiler`] traits so the pipeline can be tested with fakes.

mod diagram;
mod doctor;
mod matcher;
mod mermaid;
mod metadata;
mod pandoc;
pub mod process;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use md2pdf_config::DiagramFormat;
use tokio_util::sync::CancellationToken;

pub use diagram::{DiagramBlock, extract_diagrams, image_reference, substitute_diagrams};
pub use doctor::{ToolStatus, probe};
pub use matcher::{FileMatcher, expand_input};
pub use mermaid::MermaidRenderer;
pub use metadata::{DocumentMetadata, title_from_filename};
pub use pandoc::PandocCompiler;

/// Error raised by an external tool or the plumbing around it.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Executable is not installed or not on `PATH`.
    #[error("{tool}: executable '{program}' not found")]
    NotFound { tool: &'static str, program: String },
    /// Process could not be spawned for another reason.
    #[error("{tool}: failed to start: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    /// Waiting for the process failed.
    #[error("{tool}: failed to wait for process: {source}")]
    Wait {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    /// Process exited unsuccessfully.
    #[error("{tool} exited with {}: {stderr}", code.map_or_else(|| "signal".to_owned(), |c| format!("code {c}")))]
    Failed {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },
    /// Process exceeded its time limit and was killed.
    #[error("{tool} timed out after {:.1}s", limit.as_secs_f64())]
    Timeout { tool: &'static str, limit: Duration },
    /// Process was killed because the run was cancelled.
    #[error("{tool} cancelled")]
    Cancelled { tool: &'static str },
    /// Process succeeded but did not write its output.
    #[error("{tool} produced no output at {}", path.display())]
    MissingOutput { tool: &'static str, path: PathBuf },
    /// Filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Input discovery failed.
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

impl ToolError {
    pub(crate) fn spawn(
        tool: &'static str,
        program: &std::ffi::OsStr,
        source: std::io::Error,
    ) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                tool,
                program: program.to_string_lossy().into_owned(),
            }
        } else {
            Self::Spawn { tool, source }
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is caused by the input itself and would recur.
    #[must_use]
    pub fn is_content_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::MissingOutput { .. })
    }
}

/// Renders one diagram source into an artifact file.
pub trait DiagramRenderer: Send + Sync {
    /// Artifact format produced by this renderer.
    fn format(&self) -> DiagramFormat;

    /// Render `source` into `work_dir`, returning the artifact path.
    ///
    /// `work_dir` is a private scratch directory; the caller publishes the
    /// returned file.
    fn render(
        &self,
        source: &str,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<PathBuf, ToolError>> + Send;
}

/// Compiles a prepared Markdown document into the final PDF.
pub trait DocumentCompiler: Send + Sync {
    fn compile(
        &self,
        input: &Path,
        output: &Path,
        metadata: &DocumentMetadata,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), ToolError>> + Send;
}
