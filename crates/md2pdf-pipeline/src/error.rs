//! Pipeline errors and job error mapping.

use std::path::PathBuf;

use md2pdf_cache::CacheError;
use md2pdf_convert::ToolError;
use md2pdf_pool::{ErrorKind, ErrorStatus, JobError, PoolError};
use md2pdf_watch::WatchError;

/// Errors that stop a run before or outside its jobs.
///
/// Failures inside a job never surface here; they are recorded in the
/// batch result.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error("cannot resolve {}: {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Conversion step a tool error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Render,
    Compile,
}

impl Step {
    fn failure(self, message: String) -> JobError {
        match self {
            Self::Render => JobError::render(message),
            Self::Compile => JobError::compile(message),
        }
    }
}

/// Classify a tool error for the retry policy.
///
/// A tool that exits unsuccessfully failed on the content and is permanent.
/// A missing executable is permanent too. Timeouts and other I/O problems
/// are temporary.
pub(crate) fn job_error(err: ToolError, step: Step) -> JobError {
    let message = err.to_string();
    match err {
        ToolError::NotFound { tool, .. } => JobError::new(ErrorKind::Io, message)
            .with_status(ErrorStatus::Permanent)
            .with_tool(tool),
        ToolError::Spawn { tool, source } | ToolError::Wait { tool, source } => {
            JobError::io(&source, None).with_tool(tool)
        }
        ToolError::Failed { tool, .. } | ToolError::MissingOutput { tool, .. } => {
            step.failure(message).with_tool(tool)
        }
        ToolError::Timeout { tool, limit } => JobError::timeout(limit).with_tool(tool),
        ToolError::Cancelled { tool } => JobError::cancelled().with_tool(tool),
        ToolError::Io { path, source } => JobError::io(&source, Some(path)),
        ToolError::Pattern { .. } => JobError::new(ErrorKind::Internal, message),
    }
}

pub(crate) fn cache_job_error(err: CacheError) -> JobError {
    match err {
        CacheError::Io { path, source } => JobError::io(&source, Some(path)),
        CacheError::MissingArtifact(path) => {
            JobError::render("renderer reported success but wrote no artifact").with_path(path)
        }
    }
}
