//! Bounded batch execution.
//!
//! ```text
//! submit_batch
//!   |-- acquire permit (semaphore, max_workers)  <- stops on cancel
//!   |-- spawn job task (holds permit for its whole retry chain)
//!   |     attempt 0 -> timeout? -> backoff -> attempt 1 -> ...
//!   '-- join tasks -> ProgressSink::advance -> BatchResult (submission order)
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    BatchResult, Completion, ConversionJob, ErrorKind, JobError, JobId, JobOutcome, JobState,
    PoolError, Progress, ProgressSink, RetryPolicy,
};

/// How long a timed-out or cancelled attempt gets to kill its process.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Pool settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_workers: usize,
    /// Time limit for a single attempt.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

/// Context handed to the work function for each attempt.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub job: JobId,
    /// Zero-based attempt number.
    pub attempt: u32,
    /// Cancelled when the attempt times out or the batch is cancelled.
    /// External processes must be killed when this fires.
    pub cancel: CancellationToken,
}

/// Executes batches of jobs with bounded parallelism.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    config: PoolConfig,
}

impl WorkerPool {
    /// Create a pool, rejecting invalid settings.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        if config.max_workers == 0 {
            return Err(PoolError::InvalidWorkerCount(config.max_workers));
        }
        if config.timeout.is_zero() {
            return Err(PoolError::ZeroTimeout);
        }
        config.retry.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Run every job through `work`, never more than `max_workers` at once.
    ///
    /// Failures are isolated: a failed job never stops its siblings. When
    /// `cancel` fires, no further jobs are admitted, running attempts see
    /// their [`AttemptContext::cancel`] token fire, and every unfinished job
    /// is recorded [`JobOutcome::Cancelled`].
    pub async fn submit_batch<S, T, F, Fut>(
        &self,
        jobs: Vec<ConversionJob<S>>,
        work: F,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> BatchResult<T>
    where
        S: Clone + Send + Sync + 'static,
        T: Send + 'static,
        F: Fn(S, AttemptContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, JobError>> + Send + 'static,
    {
        if jobs.is_empty() {
            return BatchResult::empty();
        }

        let started = Instant::now();
        let total = jobs.len();
        let work = Arc::new(work);
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut slots: Vec<Option<(JobId, JobOutcome<T>)>> = (0..total).map(|_| None).collect();
        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::new();
        let mut completed = 0;

        tracing::info!(
            jobs = total,
            max_workers = self.config.max_workers,
            "Starting batch"
        );

        let mut queue = jobs.into_iter().enumerate();
        let mut next = queue.next();

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled(), if next.is_some() => {
                    // Stop admitting; everything still queued is cancelled
                    for (index, job) in next.take().into_iter().chain(queue.by_ref()) {
                        completed += 1;
                        report(progress, &job.id, &JobOutcome::<T>::Cancelled, completed, total);
                        slots[index] = Some((job.id, JobOutcome::Cancelled));
                    }
                }

                Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    let Some((index, id, outcome)) = finish_task(&mut task_index, joined) else {
                        continue;
                    };
                    completed += 1;
                    report(progress, &id, &outcome, completed, total);
                    slots[index] = Some((id, outcome));
                }

                permit = Arc::clone(&semaphore).acquire_owned(), if next.is_some() => {
                    let Some((index, job)) = next.take() else {
                        continue;
                    };
                    let Ok(permit) = permit else {
                        completed += 1;
                        report(progress, &job.id, &JobOutcome::<T>::Cancelled, completed, total);
                        slots[index] = Some((job.id, JobOutcome::Cancelled));
                        next = queue.next();
                        continue;
                    };

                    let id = job.id.clone();
                    let work = Arc::clone(&work);
                    let config = self.config.clone();
                    let cancel = cancel.clone();
                    let handle = tasks.spawn(async move {
                        let _permit = permit;
                        run_job(&job, work.as_ref(), &config, &cancel).await
                    });
                    task_index.insert(handle.id(), (index, id));
                    next = queue.next();
                }

                else => break,
            }
        }

        debug_assert!(task_index.is_empty(), "joined tasks left in the index");
        let outcomes = slots.into_iter().flatten().collect();
        let result = BatchResult {
            outcomes,
            duration: started.elapsed(),
        };

        tracing::info!(
            succeeded = result.success_count(),
            failed = result.failure_count(),
            cancelled = result.cancelled_count(),
            elapsed_ms = result.duration.as_millis(),
            "Batch finished"
        );

        result
    }
}

/// Take a joined task out of the index and turn it into its job's outcome.
/// A panicked task becomes an [`ErrorKind::Internal`] failure.
fn finish_task<T>(
    task_index: &mut HashMap<task::Id, (usize, JobId)>,
    joined: Result<(task::Id, JobOutcome<T>), JoinError>,
) -> Option<(usize, JobId, JobOutcome<T>)> {
    let (task_id, outcome) = match joined {
        Ok((task_id, outcome)) => (task_id, Ok(outcome)),
        Err(err) => (err.id(), Err(err)),
    };
    let (index, id) = task_index.remove(&task_id)?;

    let outcome = outcome.unwrap_or_else(|err| {
        tracing::error!(job = %id, error = %err, "Job task panicked");
        JobOutcome::Failure(JobError::new(ErrorKind::Internal, err.to_string()))
    });
    Some((index, id, outcome))
}

fn report<T>(
    sink: &dyn ProgressSink,
    job: &JobId,
    outcome: &JobOutcome<T>,
    completed: usize,
    total: usize,
) {
    let completion = match outcome {
        JobOutcome::Success(_) => Completion::Succeeded,
        JobOutcome::Failure(err) => Completion::Failed(err),
        JobOutcome::Cancelled => Completion::Cancelled,
    };
    sink.advance(Progress {
        job,
        completion,
        completed,
        total,
    });
}

/// Run one job through its full retry chain.
async fn run_job<S, T, F, Fut>(
    job: &ConversionJob<S>,
    work: &F,
    config: &PoolConfig,
    cancel: &CancellationToken,
) -> JobOutcome<T>
where
    S: Clone,
    F: Fn(S, AttemptContext) -> Fut,
    Fut: Future<Output = Result<T, JobError>>,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return JobOutcome::Cancelled;
        }

        tracing::debug!(job = %job.id, attempt, state = ?JobState::Running, "Starting attempt");
        let error = match run_attempt(job, work, config.timeout, attempt, cancel).await {
            Ok(value) => {
                tracing::info!(
                    job = %job.id,
                    attempts = attempt + 1,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Job succeeded"
                );
                return JobOutcome::Success(value);
            }
            Err(error) => error,
        };

        if cancel.is_cancelled() || error.kind == ErrorKind::Cancelled {
            tracing::info!(job = %job.id, attempt, "Job cancelled");
            return JobOutcome::Cancelled;
        }

        if !config.retry.should_retry(&error, attempt) {
            tracing::info!(
                job = %job.id,
                attempts = attempt + 1,
                elapsed_ms = started.elapsed().as_millis(),
                error = %error,
                "Job failed"
            );
            return JobOutcome::Failure(error);
        }

        let delay = config.retry.delay(attempt);
        tracing::warn!(
            job = %job.id,
            attempt,
            delay_ms = delay.as_millis(),
            state = ?JobState::Retrying,
            error = %error,
            "Attempt failed, retrying"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return JobOutcome::Cancelled,
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

/// Run a single attempt under the time limit.
async fn run_attempt<S, T, F, Fut>(
    job: &ConversionJob<S>,
    work: &F,
    timeout: Duration,
    attempt: u32,
    cancel: &CancellationToken,
) -> Result<T, JobError>
where
    S: Clone,
    F: Fn(S, AttemptContext) -> Fut,
    Fut: Future<Output = Result<T, JobError>>,
{
    let attempt_token = cancel.child_token();
    let ctx = AttemptContext {
        job: job.id.clone(),
        attempt,
        cancel: attempt_token.clone(),
    };
    let fut = work(job.source.clone(), ctx);
    tokio::pin!(fut);

    tokio::select! {
        biased;
        result = &mut fut => result,
        () = tokio::time::sleep(timeout) => {
            attempt_token.cancel();
            // Let the attempt kill and reap its process before dropping it
            let _ = tokio::time::timeout(KILL_GRACE, &mut fut).await;
            Err(JobError::timeout(timeout))
        }
        () = cancel.cancelled() => {
            let _ = tokio::time::timeout(KILL_GRACE, &mut fut).await;
            Err(JobError::cancelled())
        }
    }
}
