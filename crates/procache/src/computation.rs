use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;

use crate::key::CacheKey;
use crate::stats::{CacheStats, Counters};
use crate::watch::{ChangeEvent, ChangeHandler, WatchError, WatchRegistry};

type AsyncComputation<A, T, E> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type SyncComputation<A, T, E> = Arc<dyn Fn(A) -> Result<T, E> + Send + Sync>;

/// A process-lifetime memoizing cache around an async computation.
///
/// Every call derives a [`CacheKey`] from its arguments. If the store holds a value for that key,
/// it is returned without running the computation. Otherwise the computation runs, and its
/// result is stored if, and only if, it succeeded. Failures propagate to the caller and the next
/// call with the same arguments tries again.
///
/// Concurrent calls for the same key are coalesced: only one computation is started, and all
/// callers observe its result.
///
/// The store is unbounded. Entries are only removed by [`invalidate`](Self::invalidate),
/// [`invalidate_all`](Self::invalidate_all), or by change events after calling
/// [`watch`](Self::watch).
///
/// Clones share the store, the computation and the statistics.
pub struct ProcessCache<A, T, E> {
    name: Arc<str>,
    compute: AsyncComputation<A, T, E>,
    store: moka::future::Cache<CacheKey, Arc<T>>,
    counters: Arc<Counters>,
}

impl<A, T, E> Clone for ProcessCache<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            compute: Arc::clone(&self.compute),
            store: self.store.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<A, T, E> fmt::Debug for ProcessCache<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessCache")
            .field("name", &self.name)
            .field("in-memory items", &self.store.entry_count())
            .finish()
    }
}

impl<A, T, E> ProcessCache<A, T, E>
where
    A: Serialize + Send + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Wraps `compute` into a new cache with an empty store.
    ///
    /// The `name` is used in logs only.
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, compute: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let name = name.into();
        let store = moka::future::Cache::builder().name(&name).build();

        Self {
            name,
            compute: Arc::new(move |args| compute(args).boxed()),
            store,
            counters: Default::default(),
        }
    }

    /// Returns the cached value for `args`, running the computation on a miss.
    ///
    /// # Errors
    ///
    /// Errors of the computation are returned as-is. They are shared between all callers that
    /// were waiting on the same computation, hence the [`Arc`].
    pub async fn call(&self, args: A) -> Result<Arc<T>, Arc<E>> {
        self.counters.access();

        let key = match CacheKey::from_args(&args) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(
                    error = &e as &dyn std::error::Error,
                    cache = %self.name,
                    "Arguments are not serializable, computing without cache",
                );
                return self.compute(args).await.map_err(Arc::new);
            }
        };

        let entry = self
            .store
            .entry_by_ref(&key)
            .or_try_insert_with(self.compute(args))
            .await?;

        if entry.is_fresh() {
            tracing::trace!(cache = %self.name, %key, "Stored fresh entry");
        } else {
            self.counters.hit();
            tracing::trace!(cache = %self.name, %key, "Cache hit");
        }

        Ok(entry.into_value())
    }

    async fn compute(&self, args: A) -> Result<Arc<T>, E> {
        self.counters.computation();
        match (self.compute)(args).await {
            Ok(value) => Ok(Arc::new(value)),
            Err(e) => {
                self.counters.failure();
                tracing::debug!(cache = %self.name, "Computation failed, not caching");
                Err(e)
            }
        }
    }

    /// Removes the entry for `key`, returning whether there was one.
    ///
    /// This does not recompute anything, the next call for `key` simply misses.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.store.remove(key).await.is_some();
        if removed {
            self.counters.invalidation();
            tracing::debug!(cache = %self.name, %key, "Invalidated entry");
        }
        removed
    }

    /// Removes all entries.
    pub async fn invalidate_all(&self) {
        let keys: Vec<_> = self.store.iter().map(|(key, _)| key).collect();
        let mut entries = 0;
        for key in keys {
            if self.store.remove(&*key).await.is_some() {
                self.counters.invalidation();
                entries += 1;
            }
        }
        tracing::debug!(cache = %self.name, entries, "Invalidated all entries");
    }

    /// Whether a value is stored for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.store.contains_key(key)
    }

    /// The number of stored entries.
    pub async fn entry_count(&self) -> u64 {
        self.store.run_pending_tasks().await;
        self.store.entry_count()
    }

    /// A snapshot of the counters of this cache.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entry_count().await;
        self.counters.snapshot(entries)
    }

    /// The name this cache was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invalidates entries whenever files below `dir` change.
    ///
    /// For every change reported by `registry` for a non-empty relative path, `key_from_path` maps
    /// that path to the key to evict. Returning `None` ignores the change.
    ///
    /// A change reported while the entry is still being computed evicts nothing, and the result of
    /// that computation is stored once it completes.
    ///
    /// The registration lives as long as `registry` does.
    pub fn watch<R, K>(
        &self,
        registry: &R,
        dir: impl AsRef<Path>,
        key_from_path: K,
    ) -> Result<(), WatchError>
    where
        R: WatchRegistry + ?Sized,
        K: Fn(&Path) -> Option<CacheKey> + Send + Sync + 'static,
    {
        let cache = self.clone();
        let invalidate = move |key: CacheKey| {
            let cache = cache.clone();
            async move {
                cache.invalidate(&key).await;
            }
            .boxed()
        };
        register_watch(registry, dir.as_ref(), &self.name, key_from_path, invalidate)
    }

    /// Calls [`watch`](Self::watch), but only if `development` is enabled.
    ///
    /// Outside of development nothing is registered at all.
    pub fn watch_if<R, K>(
        &self,
        development: bool,
        registry: &R,
        dir: impl AsRef<Path>,
        key_from_path: K,
    ) -> Result<(), WatchError>
    where
        R: WatchRegistry + ?Sized,
        K: Fn(&Path) -> Option<CacheKey> + Send + Sync + 'static,
    {
        if !development {
            return Ok(());
        }
        self.watch(registry, dir, key_from_path)
    }
}

/// A process-lifetime memoizing cache around a blocking computation.
///
/// This behaves exactly like [`ProcessCache`], except that both the computation and
/// [`call`](Self::call) are synchronous. Concurrent callers of the same key block until the
/// single running computation finishes.
pub struct SyncProcessCache<A, T, E> {
    name: Arc<str>,
    compute: SyncComputation<A, T, E>,
    store: moka::sync::Cache<CacheKey, Arc<T>>,
    counters: Arc<Counters>,
}

impl<A, T, E> Clone for SyncProcessCache<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            compute: Arc::clone(&self.compute),
            store: self.store.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<A, T, E> fmt::Debug for SyncProcessCache<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncProcessCache")
            .field("name", &self.name)
            .field("in-memory items", &self.store.entry_count())
            .finish()
    }
}

impl<A, T, E> SyncProcessCache<A, T, E>
where
    A: Serialize + Send + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Wraps `compute` into a new cache with an empty store.
    pub fn new<F>(name: impl Into<Arc<str>>, compute: F) -> Self
    where
        F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
    {
        let name = name.into();
        let store = moka::sync::Cache::builder().name(&name).build();

        Self {
            name,
            compute: Arc::new(compute),
            store,
            counters: Default::default(),
        }
    }

    /// Returns the cached value for `args`, running the computation on a miss.
    ///
    /// See [`ProcessCache::call`].
    pub fn call(&self, args: A) -> Result<Arc<T>, Arc<E>> {
        self.counters.access();

        let key = match CacheKey::from_args(&args) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(
                    error = &e as &dyn std::error::Error,
                    cache = %self.name,
                    "Arguments are not serializable, computing without cache",
                );
                return self.compute(args).map_err(Arc::new);
            }
        };

        let entry = self
            .store
            .entry_by_ref(&key)
            .or_try_insert_with(|| self.compute(args))?;

        if entry.is_fresh() {
            tracing::trace!(cache = %self.name, %key, "Stored fresh entry");
        } else {
            self.counters.hit();
            tracing::trace!(cache = %self.name, %key, "Cache hit");
        }

        Ok(entry.into_value())
    }

    fn compute(&self, args: A) -> Result<Arc<T>, E> {
        self.counters.computation();
        match (self.compute)(args) {
            Ok(value) => Ok(Arc::new(value)),
            Err(e) => {
                self.counters.failure();
                tracing::debug!(cache = %self.name, "Computation failed, not caching");
                Err(e)
            }
        }
    }

    /// Removes the entry for `key`, returning whether there was one.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.store.remove(key).is_some();
        if removed {
            self.counters.invalidation();
            tracing::debug!(cache = %self.name, %key, "Invalidated entry");
        }
        removed
    }

    /// Removes all entries.
    pub fn invalidate_all(&self) {
        let keys: Vec<_> = self.store.iter().map(|(key, _)| key).collect();
        let mut entries = 0;
        for key in keys {
            if self.store.remove(&*key).is_some() {
                self.counters.invalidation();
                entries += 1;
            }
        }
        tracing::debug!(cache = %self.name, entries, "Invalidated all entries");
    }

    /// Whether a value is stored for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.store.contains_key(key)
    }

    /// The number of stored entries.
    pub fn entry_count(&self) -> u64 {
        self.store.run_pending_tasks();
        self.store.entry_count()
    }

    /// A snapshot of the counters of this cache.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entry_count())
    }

    /// The name this cache was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invalidates entries whenever files below `dir` change.
    ///
    /// See [`ProcessCache::watch`].
    pub fn watch<R, K>(
        &self,
        registry: &R,
        dir: impl AsRef<Path>,
        key_from_path: K,
    ) -> Result<(), WatchError>
    where
        R: WatchRegistry + ?Sized,
        K: Fn(&Path) -> Option<CacheKey> + Send + Sync + 'static,
    {
        let cache = self.clone();
        let invalidate = move |key: CacheKey| {
            cache.invalidate(&key);
            futures::future::ready(()).boxed()
        };
        register_watch(registry, dir.as_ref(), &self.name, key_from_path, invalidate)
    }

    /// Calls [`watch`](Self::watch), but only if `development` is enabled.
    pub fn watch_if<R, K>(
        &self,
        development: bool,
        registry: &R,
        dir: impl AsRef<Path>,
        key_from_path: K,
    ) -> Result<(), WatchError>
    where
        R: WatchRegistry + ?Sized,
        K: Fn(&Path) -> Option<CacheKey> + Send + Sync + 'static,
    {
        if !development {
            return Ok(());
        }
        self.watch(registry, dir, key_from_path)
    }
}

/// Registers a [`ChangeHandler`] that maps changed paths to keys and passes them to `invalidate`.
fn register_watch<R, K, I>(
    registry: &R,
    dir: &Path,
    name: &str,
    key_from_path: K,
    invalidate: I,
) -> Result<(), WatchError>
where
    R: WatchRegistry + ?Sized,
    K: Fn(&Path) -> Option<CacheKey> + Send + Sync + 'static,
    I: Fn(CacheKey) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    let cache_name: Arc<str> = name.into();
    let handler: ChangeHandler = Arc::new(move |event: ChangeEvent| {
        if event.path.as_os_str().is_empty() {
            return futures::future::ready(()).boxed();
        }
        match key_from_path(&event.path) {
            Some(key) => {
                tracing::debug!(
                    cache = %cache_name,
                    path = %event.path.display(),
                    kind = ?event.kind,
                    %key,
                    "File changed, busting cache entry",
                );
                invalidate(key)
            }
            None => futures::future::ready(()).boxed(),
        }
    });

    registry.register(dir, handler)?;
    tracing::info!(cache = %name, path = %dir.display(), "Watching for changes");
    Ok(())
}
