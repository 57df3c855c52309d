//! Quiet-period debouncing.
//!
//! Each watched root gets one [`ChangeDebouncer`] actor task that owns a
//! [`DebounceState`]. Events are fed through a channel, so the timer is only
//! ever touched by that task.
//!
//! ```text
//!          admit                       admit (resets deadline)
//!   Idle ─────────► Armed ◄──────────────────┐
//!    ▲                │ └────────────────────┘
//!    │   deadline     │
//!    └────────────────┘  emit Trigger (all paths since last fire)
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::event::{ChangeKind, RawEvent, Trigger};

/// Debouncer state for one root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Armed,
}

/// Pending changes and quiet-period deadline for one root.
#[derive(Debug)]
pub struct DebounceState {
    quiet: Duration,
    pending: BTreeMap<PathBuf, ChangeKind>,
    deadline: Option<Instant>,
}

impl DebounceState {
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: BTreeMap::new(),
            deadline: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> WatchState {
        if self.deadline.is_some() {
            WatchState::Armed
        } else {
            WatchState::Idle
        }
    }

    /// When the pending set will fire, if armed.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Record an admitted event, arming or extending the quiet period.
    pub fn admit(&mut self, path: PathBuf, kind: ChangeKind, at: Instant) {
        match self.pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(kind);
            }
            Entry::Occupied(mut entry) => {
                let merged = coalesce(*entry.get(), kind);
                entry.insert(merged);
            }
        }

        let deadline = at + self.quiet;
        self.deadline = Some(match self.deadline {
            Some(current) if current > deadline => current,
            _ => deadline,
        });
    }

    /// Take the pending changes if the quiet period has elapsed.
    pub fn fire(&mut self, now: Instant) -> Option<BTreeMap<PathBuf, ChangeKind>> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(std::mem::take(&mut self.pending))
            }
            _ => None,
        }
    }
}

/// Merge two kinds observed for the same path within one quiet period.
///
/// Unlike a per-file event stream, a path is never dropped from the set:
/// created-then-removed is reported as removed so consumers can skip it.
#[allow(clippy::match_same_arms)]
fn coalesce(existing: ChangeKind, new: ChangeKind) -> ChangeKind {
    use ChangeKind::{Created, Modified, Removed};

    match (existing, new) {
        (Created, Created | Modified) => Created,
        (Created, Removed) => Removed,

        (Modified, Created) => Created,
        (Modified, Modified) => Modified,
        (Modified, Removed) => Removed,

        // File was replaced
        (Removed, Created) => Modified,
        (Removed, Modified) => Modified,
        (Removed, Removed) => Removed,
    }
}

/// Sequential debounce actor for one watched root.
pub struct ChangeDebouncer {
    root: PathBuf,
    state: DebounceState,
    events: mpsc::Receiver<RawEvent>,
    triggers: mpsc::Sender<Trigger>,
}

impl ChangeDebouncer {
    #[must_use]
    pub fn new(
        root: PathBuf,
        quiet: Duration,
        events: mpsc::Receiver<RawEvent>,
        triggers: mpsc::Sender<Trigger>,
    ) -> Self {
        Self {
            root,
            state: DebounceState::new(quiet),
            events,
            triggers,
        }
    }

    /// Run the actor on the current runtime until `cancel` fires, the event
    /// channel closes, or the trigger receiver is dropped.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(mut self, cancel: CancellationToken) {
        tracing::debug!(root = %self.root.display(), "Debouncer started");

        loop {
            let deadline = self.state.deadline();

            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    tracing::debug!(path = %event.path.display(), kind = ?event.kind, "Admitted change");
                    self.state.admit(event.path, event.kind, event.at);
                }

                () = sleep_until(deadline), if deadline.is_some() => {
                    let Some(changes) = self.state.fire(Instant::now()) else {
                        continue;
                    };
                    tracing::info!(
                        root = %self.root.display(),
                        paths = changes.len(),
                        "Changes settled"
                    );
                    let trigger = Trigger {
                        root: self.root.clone(),
                        changes,
                    };
                    if self.triggers.send(trigger).await.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(root = %self.root.display(), "Debouncer stopped");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    }
}
