//! File-change monitoring for an active session. The changed-file count is
//! informational only; nothing gates on it.

use crate::error::Result;
use crate::paths;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Receives every changed path under the watched root.
pub type ChangeSink = Box<dyn Fn(PathBuf) + Send + Sync + 'static>;

pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, root: &Path, sink: ChangeSink) -> Result<Subscription>;
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Live subscription. Released exactly once, by `unsubscribe` or on drop.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ChangedFiles
// ---------------------------------------------------------------------------

/// Set of distinct paths touched since monitoring started.
#[derive(Debug, Clone, Default)]
pub struct ChangedFiles(Arc<Mutex<BTreeSet<PathBuf>>>);

impl ChangedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: PathBuf) {
        if let Ok(mut set) = self.0.lock() {
            set.insert(path);
        }
    }

    pub fn count(&self) -> usize {
        self.0.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.0
            .lock()
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sink that records into this set.
    pub fn sink(&self) -> ChangeSink {
        let files = self.clone();
        Box::new(move |path| files.record(path))
    }
}

// ---------------------------------------------------------------------------
// NotifyFeed
// ---------------------------------------------------------------------------

/// Recursive filesystem watcher backed by `notify`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyFeed;

impl ChangeFeed for NotifyFeed {
    fn subscribe(&self, root: &Path, sink: ChangeSink) -> Result<Subscription> {
        let watched = root.to_path_buf();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    for path in event.paths {
                        if paths::is_inside(&watched, &path) && !is_vcs_path(&watched, &path) {
                            sink(path);
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "file watch error"),
            })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), "file monitoring started");

        let root = root.to_path_buf();
        Ok(Subscription::new(move || {
            drop(watcher);
            tracing::debug!(root = %root.display(), "file monitoring stopped");
        }))
    }
}

/// Paths inside `.git` churn on every status call and are not agent work.
fn is_vcs_path(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .any(|c| matches!(c, Component::Normal(n) if n == ".git"))
        })
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unsubscribe_runs_release_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let mut sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        drop(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn changed_files_counts_distinct_paths() {
        let files = ChangedFiles::new();
        let sink = files.sink();
        sink(PathBuf::from("/p/a.rs"));
        sink(PathBuf::from("/p/a.rs"));
        sink(PathBuf::from("/p/b.rs"));
        assert_eq!(files.count(), 2);
        assert_eq!(
            files.snapshot(),
            vec![PathBuf::from("/p/a.rs"), PathBuf::from("/p/b.rs")]
        );
    }

    #[test]
    fn vcs_paths_are_ignored() {
        let root = Path::new("/p");
        assert!(is_vcs_path(root, Path::new("/p/.git/index")));
        assert!(!is_vcs_path(root, Path::new("/p/src/git.rs")));
    }

    #[test]
    fn notify_feed_subscribes_to_existing_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let files = ChangedFiles::new();
        let mut sub = NotifyFeed.subscribe(dir.path(), files.sink()).unwrap();
        assert!(sub.is_active());
        sub.unsubscribe();
        assert!(!sub.is_active());
    }
}
