//! Progress reporting.

use crate::{JobError, JobId};

/// How a job finished, as seen by a [`ProgressSink`].
#[derive(Debug, Clone, Copy)]
pub enum Completion<'a> {
    Succeeded,
    Failed(&'a JobError),
    Cancelled,
}

/// One completed job.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub job: &'a JobId,
    pub completion: Completion<'a>,
    /// Jobs finished so far, including this one. Monotonic.
    pub completed: usize,
    pub total: usize,
}

/// Receives one call per job once its retry chain is over.
///
/// Jobs cancelled before they were ever admitted are reported too, so
/// `completed` always reaches `total`.
pub trait ProgressSink {
    fn advance(&self, progress: Progress<'_>);
}

/// Sink that discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self, _progress: Progress<'_>) {}
}

impl<F> ProgressSink for F
where
    F: Fn(Progress<'_>),
{
    fn advance(&self, progress: Progress<'_>) {
        self(progress);
    }
}
