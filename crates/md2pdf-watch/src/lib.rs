//! Debounced change triggers for md2pdf watch mode.
//!
//! Filesystem events flow through three stages:
//!
//! 1. a notify watcher per root, whose callback applies the [`PathFilter`]
//!    (ignored or out-of-scope paths never reach the timer)
//! 2. a [`ChangeDebouncer`] actor per root that coalesces events until the
//!    quiet period elapses
//! 3. a shared channel of [`Trigger`]s, each carrying every path seen since
//!    the previous trigger for that root
//!
//! ```ignore
//! let (mut triggers, _handle) = md2pdf_watch::watch(&[docs], &WatchConfig::default())?;
//! while let Some(trigger) = triggers.recv().await {
//!     rebuild(trigger.present());
//! }
//! ```

mod debouncer;
mod event;
mod filter;
mod watcher;

use std::path::PathBuf;

pub use debouncer::{ChangeDebouncer, DebounceState, WatchState};
pub use event::{ChangeKind, RawEvent, Trigger};
pub use filter::PathFilter;
pub use watcher::{WatchConfig, WatchHandle, watch};

/// Error starting a watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watch root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("filesystem watcher error: {0}")]
    Notify(#[from] notify::Error),
}
