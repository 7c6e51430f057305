//! Filesystem change notifications driving cache invalidation.
//!
//! The cache does not reach into the filesystem itself. It registers a [`ChangeHandler`] with a
//! [`WatchRegistry`], which reports [`ChangeEvent`]s for files below a watched directory.
//! [`FsWatcher`] is the real implementation on top of [`notify`], while [`ManualWatcher`] lets
//! change events be fed in from anywhere else.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;

/// The kind of a reported change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A file appeared, disappeared or was renamed.
    Rename,
    /// The contents or metadata of a file changed.
    Change,
}

/// A change to a file below a watched directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    /// What happened to the file.
    pub kind: ChangeKind,
    /// The path of the file, relative to the watched directory.
    pub path: PathBuf,
}

impl ChangeEvent {
    /// Creates a new change event for a path relative to the watched directory.
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// A callback receiving change events.
pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// An error setting up a filesystem watch.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The directory to watch does not exist.
    #[error("watch directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),
    /// The platform watcher could not be created or attached to the directory.
    #[error("failed to watch {}", path.display())]
    Notify {
        /// The directory that should have been watched.
        path: PathBuf,
        /// The underlying watcher error.
        #[source]
        source: notify::Error,
    },
}

/// Something that reports changes below a directory.
pub trait WatchRegistry {
    /// Starts reporting changes below `dir` to `handler`.
    ///
    /// Registrations live as long as the registry itself; there is no way to unregister.
    fn register(&self, dir: &Path, handler: ChangeHandler) -> Result<(), WatchError>;
}

impl<W: WatchRegistry + ?Sized> WatchRegistry for Arc<W> {
    fn register(&self, dir: &Path, handler: ChangeHandler) -> Result<(), WatchError> {
        (**self).register(dir, handler)
    }
}

/// A [`WatchRegistry`] using the recommended platform watcher of [`notify`].
///
/// Directories are watched recursively. Handlers are run on the watcher's own thread.
#[derive(Default)]
pub struct FsWatcher {
    watchers: Mutex<Vec<RecommendedWatcher>>,
}

impl FsWatcher {
    /// Creates a watcher without any registrations.
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for FsWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let watchers = self
            .watchers
            .try_lock()
            .map(|w| w.len())
            .unwrap_or_default();
        f.debug_struct("FsWatcher")
            .field("watchers", &watchers)
            .finish()
    }
}

impl WatchRegistry for FsWatcher {
    fn register(&self, dir: &Path, handler: ChangeHandler) -> Result<(), WatchError> {
        if !dir.is_dir() {
            return Err(WatchError::MissingDirectory(dir.to_owned()));
        }

        // Backends differ in whether they report paths as given or canonicalized.
        let mut roots = vec![dir.to_owned()];
        if let Ok(canonical) = dir.canonicalize() {
            if canonical != dir {
                roots.push(canonical);
            }
        }

        let notify_err = |source| WatchError::Notify {
            path: dir.to_owned(),
            source,
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for change in change_events(&roots, &event) {
                        futures::executor::block_on(handler(change));
                    }
                }
                Err(e) => {
                    tracing::error!(
                        error = &e as &dyn std::error::Error,
                        "Filesystem watcher reported an error",
                    );
                }
            }
        })
        .map_err(notify_err)?;

        watcher
            .watch(dir, RecursiveMode::Recursive)
            .map_err(notify_err)?;

        tracing::debug!(path = %dir.display(), "Watching directory for changes");
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(watcher);
        Ok(())
    }
}

/// Maps a raw notify [`EventKind`] to the [`ChangeKind`] reported to handlers.
///
/// Pure accesses do not change anything and are dropped.
fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
            Some(ChangeKind::Rename)
        }
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(ChangeKind::Change),
    }
}

/// Turns a notify [`Event`] into one [`ChangeEvent`] per affected path below one of `roots`.
fn change_events(roots: &[PathBuf], event: &Event) -> Vec<ChangeEvent> {
    let Some(kind) = change_kind(&event.kind) else {
        return vec![];
    };

    event
        .paths
        .iter()
        .filter_map(|path| {
            roots
                .iter()
                .find_map(|root| path.strip_prefix(root).ok())
                .filter(|relative| !relative.as_os_str().is_empty())
                .map(|relative| ChangeEvent::new(kind, relative))
        })
        .collect()
}

/// A [`WatchRegistry`] whose changes are reported by calling [`ManualWatcher::emit`].
///
/// This is useful to feed invalidations from sources other than the local filesystem, such as
/// a CMS publishing hook.
#[derive(Clone, Default)]
pub struct ManualWatcher {
    registrations: Arc<Mutex<Vec<(PathBuf, ChangeHandler)>>>,
}

impl ManualWatcher {
    /// Creates a watcher without any registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of handlers registered so far.
    pub fn registrations(&self) -> usize {
        self.lock().len()
    }

    /// Returns the directories handlers were registered for, in registration order.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.lock().iter().map(|(dir, _)| dir.clone()).collect()
    }

    /// Reports a change of `path` to every handler registered for `dir`.
    pub async fn emit(&self, dir: &Path, kind: ChangeKind, path: impl Into<PathBuf>) {
        let event = ChangeEvent::new(kind, path);
        let handlers: Vec<_> = self
            .lock()
            .iter()
            .filter(|(watched, _)| watched == dir)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(event.clone()).await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(PathBuf, ChangeHandler)>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ManualWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualWatcher")
            .field("watched_dirs", &self.watched_dirs())
            .finish()
    }
}

impl WatchRegistry for ManualWatcher {
    fn register(&self, dir: &Path, handler: ChangeHandler) -> Result<(), WatchError> {
        self.lock().push((dir.to_owned(), handler));
        Ok(())
    }
}
