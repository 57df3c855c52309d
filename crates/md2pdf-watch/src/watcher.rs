//! notify-backed filesystem watcher.

use std::path::PathBuf;
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::debouncer::ChangeDebouncer;
use crate::event::{ChangeKind, RawEvent, Trigger};
use crate::filter::PathFilter;
use crate::WatchError;

/// Capacity of the per-root raw event channel.
const EVENT_BUFFER: usize = 256;
/// Capacity of the shared trigger channel.
const TRIGGER_BUFFER: usize = 16;

/// Watch settings shared by every root.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Quiet period before a trigger fires.
    pub debounce: Duration,
    pub recursive: bool,
    /// Glob patterns matched against each path component.
    pub ignore_patterns: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            recursive: true,
            ignore_patterns: [".*", "_*", "node_modules", "__pycache__"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Handle to stop watching.
///
/// Uses RAII: dropping the handle stops the notify watchers and every
/// debouncer actor.
pub struct WatchHandle {
    watchers: Vec<RecommendedWatcher>,
    _shutdown: DropGuard,
}

impl WatchHandle {
    /// Stop watching immediately (consumes the handle).
    pub fn stop(self) {
        drop(self);
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("roots", &self.watchers.len())
            .finish_non_exhaustive()
    }
}

/// Start watching `roots`.
///
/// Must be called from within a Tokio runtime. Each root gets its own notify
/// watcher and debouncer actor; all triggers arrive on the returned channel.
pub fn watch(
    roots: &[PathBuf],
    config: &WatchConfig,
) -> Result<(mpsc::Receiver<Trigger>, WatchHandle), WatchError> {
    let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_BUFFER);
    let shutdown = CancellationToken::new();
    let mut watchers = Vec::with_capacity(roots.len());

    for root in roots {
        if !root.is_dir() {
            return Err(WatchError::RootNotFound(root.clone()));
        }
        let filter = PathFilter::new(root.clone(), &config.ignore_patterns, config.recursive)?;
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => forward(&event, &filter, &event_tx),
                Err(e) => tracing::warn!(error = %e, "Filesystem watcher error"),
            }
        })?;

        let mode = if config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(root, mode)?;
        watchers.push(watcher);

        ChangeDebouncer::new(root.clone(), config.debounce, event_rx, trigger_tx.clone())
            .spawn(shutdown.child_token());

        tracing::info!(
            root = %root.display(),
            recursive = config.recursive,
            debounce_ms = config.debounce.as_millis(),
            "Watching for changes"
        );
    }

    let handle = WatchHandle {
        watchers,
        _shutdown: shutdown.drop_guard(),
    };
    Ok((trigger_rx, handle))
}

/// Filter a notify event and forward admitted paths to the debouncer.
///
/// Runs on the notify thread, hence `blocking_send`.
fn forward(event: &Event, filter: &PathFilter, tx: &mpsc::Sender<RawEvent>) {
    let Some(kind) = ChangeKind::from_notify(&event.kind) else {
        return;
    };

    for path in &event.paths {
        if !filter.admits(path) {
            continue;
        }
        // Receiver gone means the watch is shutting down
        if tx.blocking_send(RawEvent::now(path.clone(), kind)).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;
    use std::sync::Arc;
    use notify::event::{CreateKind, MetadataKind, ModifyKind};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn notify_event(kind: EventKind, paths: &[PathBuf]) -> Event {
        paths.iter().cloned().fold(Event::new(kind), Event::add_path)
    }

    fn received(rx: &mut mpsc::Receiver<RawEvent>) -> Vec<(PathBuf, ChangeKind)> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| (e.path, e.kind))
            .collect()
    }

    fn docs_filter(recursive: bool) -> PathFilter {
        PathFilter::new("/docs", &WatchConfig::default().ignore_patterns, recursive).unwrap()
    }

    #[test]
    fn test_forward_sends_only_admitted_paths() {
        let filter = docs_filter(true);
        let (tx, mut rx) = mpsc::channel(16);
        let event = notify_event(
            EventKind::Create(CreateKind::File),
            &[
                PathBuf::from("/docs/guide.md"),
                PathBuf::from("/docs/.guide.md.swp"),
                PathBuf::from("/docs/node_modules/pkg/readme.md"),
                PathBuf::from("/docs/api/index.md"),
                PathBuf::from("/elsewhere/notes.md"),
            ],
        );

        forward(&event, &filter, &tx);

        assert_eq!(
            received(&mut rx),
            vec![
                (PathBuf::from("/docs/guide.md"), ChangeKind::Created),
                (PathBuf::from("/docs/api/index.md"), ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn test_forward_non_recursive_skips_nested_paths() {
        let filter = docs_filter(false);
        let (tx, mut rx) = mpsc::channel(16);
        let event = notify_event(
            EventKind::Modify(ModifyKind::Any),
            &[
                PathBuf::from("/docs/api/index.md"),
                PathBuf::from("/docs/guide.md"),
            ],
        );

        forward(&event, &filter, &tx);

        assert_eq!(
            received(&mut rx),
            vec![(PathBuf::from("/docs/guide.md"), ChangeKind::Modified)]
        );
    }

    #[test]
    fn test_forward_drops_metadata_only_events() {
        let filter = docs_filter(true);
        let (tx, mut rx) = mpsc::channel(16);
        let event = notify_event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &[PathBuf::from("/docs/guide.md")],
        );

        forward(&event, &filter, &tx);

        assert!(received(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_excluded_events_do_not_extend_quiet_period() {
        let filter = Arc::new(docs_filter(true));
        let (event_tx, event_rx) = mpsc::channel(16);
        let (trigger_tx, mut triggers) = mpsc::channel(4);
        ChangeDebouncer::new(
            PathBuf::from("/docs"),
            Duration::from_millis(500),
            event_rx,
            trigger_tx,
        )
        .spawn(CancellationToken::new());

        let send = |event: Event| {
            let filter = Arc::clone(&filter);
            let tx = event_tx.clone();
            tokio::task::spawn_blocking(move || forward(&event, &filter, &tx))
        };

        let started = tokio::time::Instant::now();
        send(notify_event(
            EventKind::Create(CreateKind::File),
            &[PathBuf::from("/docs/guide.md")],
        ))
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        send(notify_event(
            EventKind::Modify(ModifyKind::Any),
            &[
                PathBuf::from("/docs/.cache/state"),
                PathBuf::from("/docs/_drafts/wip.md"),
            ],
        ))
        .await
        .unwrap();

        let trigger = triggers.recv().await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(600));
        assert_eq!(
            trigger.changes.keys().cloned().collect::<Vec<_>>(),
            vec![PathBuf::from("/docs/guide.md")]
        );
    }

    #[tokio::test]
    async fn test_watch_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing");

        let result = watch(&[missing.clone()], &WatchConfig::default());

        assert!(matches!(result, Err(WatchError::RootNotFound(p)) if p == missing));
    }

    #[tokio::test]
    async fn test_watch_starts_on_existing_root() {
        let tmp = tempfile::tempdir().unwrap();

        let result = watch(&[tmp.path().to_path_buf()], &WatchConfig::default());

        assert!(result.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "timing-sensitive, can be flaky in test environments"]
    async fn test_watch_triggers_on_file_write() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let config = WatchConfig {
            debounce: Duration::from_millis(100),
            ..WatchConfig::default()
        };
        let (mut triggers, _handle) = watch(&[root.clone()], &config).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        fs::write(root.join("guide.md"), "# Guide").unwrap();
        fs::write(root.join(".hidden.md"), "# Hidden").unwrap();

        let trigger = tokio::time::timeout(Duration::from_secs(5), triggers.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trigger.root, root);
        assert!(trigger.changes.contains_key(&root.join("guide.md")));
        assert!(!trigger.changes.contains_key(&root.join(".hidden.md")));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "timing-sensitive, can be flaky in test environments"]
    async fn test_dropping_handle_closes_trigger_channel() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut triggers, handle) =
            watch(&[tmp.path().to_path_buf()], &WatchConfig::default()).unwrap();

        handle.stop();

        let closed = tokio::time::timeout(Duration::from_secs(5), triggers.recv())
            .await
            .unwrap();
        assert_eq!(closed, None);
    }
}
