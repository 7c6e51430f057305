//! A process-lifetime memoizing cache with filesystem-watch invalidation.
//!
//! Reading and transforming content from disk is expensive, and the result of doing so is the
//! same for as long as the files stay untouched. [`ProcessCache`] wraps such a computation and
//! remembers its results, keyed by the arguments of each call.
//!
//! ## Keys
//!
//! The [`CacheKey`] of a call is a deterministic structural serialization of its arguments. Any
//! argument type implementing [`serde::Serialize`] works, usually a tuple of the arguments. Object
//! keys are sorted, so the iteration order of maps does not matter. Arguments that cannot be
//! serialized are computed without caching.
//!
//! ## Lifecycle of an entry
//!
//! Each key is either *absent* or *cached*:
//!
//! - A call for an absent key runs the computation. Concurrent calls for the same key wait for
//!   that single computation instead of starting their own.
//! - A successful result moves the key to *cached*, and all later calls return the very same
//!   [`Arc`](std::sync::Arc) without running the computation again.
//! - A failed computation leaves the key *absent*. The error is returned to every waiting
//!   caller and the next call tries again.
//! - Invalidation moves a cached key back to *absent*, nothing is recomputed eagerly.
//!
//! ## Watching for changes
//!
//! During interactive development, the files behind cached results change all the time.
//! [`ProcessCache::watch`] registers with a [`WatchRegistry`], usually an [`FsWatcher`], and
//! evicts the entry corresponding to each changed file. Which key belongs to which file is up to
//! the caller. Whether watching should happen at all is decided by the caller as well, see
//! [`ProcessCache::watch_if`].
//!
//! ```
//! use std::convert::Infallible;
//! use std::path::Path;
//!
//! use procache::{CacheKey, ManualWatcher, ProcessCache};
//!
//! # futures::executor::block_on(async {
//! let cache = ProcessCache::new("shout", |(text,): (String,)| async move {
//!     Ok::<_, Infallible>(text.to_uppercase())
//! });
//!
//! let watcher = ManualWatcher::new();
//! cache
//!     .watch(&watcher, "content", |path: &Path| {
//!         CacheKey::from_args(&(path.to_str()?,)).ok()
//!     })
//!     .unwrap();
//!
//! let loud = cache.call(("note.md".to_owned(),)).await.unwrap();
//! assert_eq!(loud.as_str(), "NOTE.MD");
//! # });
//! ```

#![warn(missing_docs, missing_debug_implementations)]

mod computation;
mod key;
mod stats;
mod watch;

pub use computation::{ProcessCache, SyncProcessCache};
pub use key::{CacheKey, KeyError};
pub use stats::CacheStats;
pub use watch::{
    ChangeEvent, ChangeHandler, ChangeKind, FsWatcher, ManualWatcher, WatchError, WatchRegistry,
};
