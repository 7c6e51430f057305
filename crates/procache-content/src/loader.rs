use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use procache::{CacheKey, CacheStats, FsWatcher, ProcessCache, WatchRegistry};

use crate::{ContentError, Document, normalize_path};

/// Options controlling a [`ContentLoader`].
#[derive(Clone)]
pub struct LoaderOptions {
    /// Whether to evict cached documents when their files change.
    pub development: bool,
    /// The registry reporting file changes in development.
    pub registry: Arc<dyn WatchRegistry + Send + Sync>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            development: false,
            registry: Arc::new(FsWatcher::new()),
        }
    }
}

impl fmt::Debug for LoaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderOptions")
            .field("development", &self.development)
            .finish_non_exhaustive()
    }
}

/// Loads markdown documents below a content directory.
///
/// Documents are parsed once and then served from a [`ProcessCache`] for the rest of the process
/// lifetime. In development, the content directory is watched and editing a file evicts exactly
/// the document read from it.
#[derive(Clone)]
pub struct ContentLoader {
    root: PathBuf,
    cache: ProcessCache<(String,), Document, ContentError>,
    // watch registrations live as long as their registry
    registry: Arc<dyn WatchRegistry + Send + Sync>,
    watching: bool,
}

impl fmt::Debug for ContentLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentLoader")
            .field("root", &self.root)
            .field("cache", &self.cache)
            .field("watching", &self.watching)
            .finish()
    }
}

impl ContentLoader {
    /// Creates a loader for the documents below `root`.
    ///
    /// If watching the directory fails, the failure is logged and documents are cached without
    /// invalidation.
    pub fn new(root: impl Into<PathBuf>, options: LoaderOptions) -> Result<Self, ContentError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ContentError::NotFound(root.display().to_string()));
        }

        let cache = ProcessCache::new("content", {
            let root = root.clone();
            move |(path,): (String,)| read_document(root.join(&path), path)
        });

        let watching = match cache.watch_if(
            options.development,
            options.registry.as_ref(),
            &root,
            key_from_changed_file,
        ) {
            Ok(()) => options.development,
            Err(e) => {
                tracing::warn!(
                    error = &e as &dyn std::error::Error,
                    root = %root.display(),
                    "Failed to watch content, changes require a restart",
                );
                false
            }
        };

        Ok(Self {
            root,
            cache,
            registry: options.registry,
            watching,
        })
    }

    /// Loads the document at `path`, relative to the content root.
    ///
    /// The path is normalized first, see [`normalize_path`].
    pub async fn load(&self, path: &str) -> Result<Arc<Document>, Arc<ContentError>> {
        let path = normalize_path(path)?;
        self.cache.call((path,)).await
    }

    /// Evicts the document at `path`, returning whether it was cached.
    pub async fn invalidate(&self, path: &str) -> Result<bool, ContentError> {
        let path = normalize_path(path)?;
        let key = document_key(&path);
        Ok(match key {
            Some(key) => self.cache.invalidate(&key).await,
            None => false,
        })
    }

    /// Evicts all cached documents.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all().await;
    }

    /// Statistics of the document cache.
    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// The content directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether file changes evict cached documents.
    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// The registry reporting file changes to this loader.
    pub fn registry(&self) -> &Arc<dyn WatchRegistry + Send + Sync> {
        &self.registry
    }
}

async fn read_document(full_path: PathBuf, path: String) -> Result<Document, ContentError> {
    tracing::debug!(%path, "Reading content");
    let raw = match tokio::fs::read_to_string(&full_path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(ContentError::NotFound(path)),
        Err(source) => return Err(ContentError::Io { path, source }),
    };
    Document::parse(&path, &raw)
}

fn document_key(path: &str) -> Option<CacheKey> {
    CacheKey::from_args(&(path,)).ok()
}

/// Maps a changed file below the content root to the key of the document read from it.
fn key_from_changed_file(changed: &Path) -> Option<CacheKey> {
    let path = normalize_path(changed.to_str()?).ok()?;
    document_key(&path)
}
