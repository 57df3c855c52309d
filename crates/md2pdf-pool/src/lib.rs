//! Bounded worker pool for md2pdf conversion batches.
//!
//! [`WorkerPool::submit_batch`] runs a list of [`ConversionJob`]s through a
//! work function with:
//!
//! - a counting semaphore capping concurrent jobs at `max_workers`
//! - a per-attempt timeout that cancels the attempt's token
//! - retry with exponential backoff for [`ErrorStatus::Temporary`] errors
//! - fail-soft aggregation into a [`BatchResult`]
//!
//! Cancellation uses [`tokio_util::sync::CancellationToken`]. Each attempt
//! receives a child token in its [`AttemptContext`]; work that spawns external
//! processes must kill them when that token fires.

mod error;
mod job;
mod pool;
mod progress;
mod retry;

pub use error::{ErrorKind, ErrorStatus, JobError, PoolError};
pub use job::{BatchResult, ConversionJob, JobId, JobOutcome, JobState};
pub use pool::{AttemptContext, PoolConfig, WorkerPool};
pub use progress::{Completion, NoProgress, Progress, ProgressSink};
pub use retry::RetryPolicy;
pub use tokio_util::sync::CancellationToken;
