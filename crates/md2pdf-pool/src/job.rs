//! Jobs, outcomes and batch results.

use std::fmt;
use std::time::Duration;

use crate::JobError;

/// Job identity, derived from its source (usually the input path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of work submitted to the pool.
///
/// The pool owns the job for the duration of the batch. `source` is handed to
/// the work function on every attempt.
#[derive(Debug, Clone)]
pub struct ConversionJob<S> {
    pub id: JobId,
    pub source: S,
}

impl<S> ConversionJob<S> {
    pub fn new(id: JobId, source: S) -> Self {
        Self { id, source }
    }
}

/// Lifecycle of a job inside the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Final outcome of a job after its full retry chain.
#[derive(Debug)]
pub enum JobOutcome<T> {
    Success(T),
    Failure(JobError),
    Cancelled,
}

impl<T> JobOutcome<T> {
    /// Terminal state corresponding to this outcome.
    #[must_use]
    pub fn state(&self) -> JobState {
        match self {
            Self::Success(_) => JobState::Succeeded,
            Self::Failure(_) => JobState::Failed,
            Self::Cancelled => JobState::Cancelled,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&JobError> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }
}

/// Aggregated result of one batch.
///
/// Outcomes are listed in submission order regardless of completion order.
#[derive(Debug)]
pub struct BatchResult<T> {
    pub outcomes: Vec<(JobId, JobOutcome<T>)>,
    pub duration: Duration,
}

impl<T> BatchResult<T> {
    /// Result of a batch with no jobs.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            outcomes: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.count(JobState::Succeeded)
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.count(JobState::Failed)
    }

    #[must_use]
    pub fn cancelled_count(&self) -> usize {
        self.count(JobState::Cancelled)
    }

    /// True when every job succeeded (vacuously true for an empty batch).
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.success_count() == self.total()
    }

    /// Failed jobs with their final error.
    pub fn failures(&self) -> impl Iterator<Item = (&JobId, &JobError)> {
        self.outcomes
            .iter()
            .filter_map(|(id, outcome)| outcome.error().map(|err| (id, err)))
    }

    /// Successful jobs with their output.
    pub fn successes(&self) -> impl Iterator<Item = (&JobId, &T)> {
        self.outcomes.iter().filter_map(|(id, outcome)| match outcome {
            JobOutcome::Success(value) => Some((id, value)),
            _ => None,
        })
    }

    fn count(&self, state: JobState) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.state() == state)
            .count()
    }
}
