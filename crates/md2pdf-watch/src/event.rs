//! Change events and triggers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::time::Instant;

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Convert a notify event kind, ignoring access and metadata-only events.
    pub(crate) fn from_notify(kind: &notify::EventKind) -> Option<Self> {
        use notify::event::ModifyKind;

        match kind {
            notify::EventKind::Create(_) => Some(Self::Created),
            notify::EventKind::Modify(ModifyKind::Metadata(_)) => None,
            notify::EventKind::Modify(_) => Some(Self::Modified),
            notify::EventKind::Remove(_) => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Raw event as delivered by the filesystem watcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub at: Instant,
}

impl RawEvent {
    #[must_use]
    pub fn now(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            at: Instant::now(),
        }
    }
}

/// Debounced set of changes under one watched root.
///
/// Contains every path observed since the previous trigger, each with its
/// coalesced change kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trigger {
    pub root: PathBuf,
    pub changes: BTreeMap<PathBuf, ChangeKind>,
}

impl Trigger {
    /// All changed paths, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.changes.keys().map(PathBuf::as_path)
    }

    /// Paths whose last known state is present on disk.
    pub fn present(&self) -> impl Iterator<Item = &Path> {
        self.changes
            .iter()
            .filter(|(_, kind)| **kind != ChangeKind::Removed)
            .map(|(path, _)| path.as_path())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
