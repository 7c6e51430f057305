use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// An error deriving a [`CacheKey`] from call arguments.
#[derive(Debug, Error)]
#[error("failed to serialize cache key arguments")]
pub struct KeyError(#[from] serde_json::Error);

/// The key of a memoized computation.
///
/// A [`CacheKey`] is the compact JSON rendering of the call arguments. Serialization goes through
/// a [`serde_json::Value`] first, which keeps object keys sorted. Two argument values that
/// serialize to the same structure therefore always produce the same key, regardless of the
/// iteration order of the maps they contain.
///
/// Sequences (and tuples) stay order-sensitive: `(1, 2)` and `(2, 1)` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    repr: Arc<str>,
}

impl CacheKey {
    /// Derives the key for a call with the given arguments.
    pub fn from_args<A>(args: &A) -> Result<Self, KeyError>
    where
        A: Serialize + ?Sized,
    {
        let value = serde_json::to_value(args)?;
        let repr = serde_json::to_string(&Canonical(&value))?;
        Ok(Self { repr: repr.into() })
    }

    /// Returns the serialized arguments this key was derived from.
    pub fn as_str(&self) -> &str {
        &self.repr
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

/// Serializes a [`Value`] with object keys in sorted order at every level.
///
/// `serde_json` only guarantees sorted maps as long as nobody in the dependency graph enables
/// its `preserve_order` feature.
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Array(items) => serializer.collect_seq(items.iter().map(Canonical)),
            Value::Object(map) => {
                let sorted: BTreeMap<&str, Canonical<'_>> = map
                    .iter()
                    .map(|(key, value)| (key.as_str(), Canonical(value)))
                    .collect();
                serializer.collect_map(sorted)
            }
            other => other.serialize(serializer),
        }
    }
}
