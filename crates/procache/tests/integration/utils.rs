use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts how often a wrapped computation actually ran.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call, returning the number of calls before this one.
    pub fn record(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A computation error carrying the failing input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("computation failed for {0}")]
pub struct Failed(pub String);
