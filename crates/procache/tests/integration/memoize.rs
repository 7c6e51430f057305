use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use procache::{CacheKey, ProcessCache};
use procache_test as test;
use serde::Serialize;

use crate::{CallCounter, Failed};

#[tokio::test]
async fn test_equal_arguments_compute_once() {
    test::setup();

    let calls = CallCounter::new();
    let cache = ProcessCache::new("render", {
        let calls = calls.clone();
        move |(path,): (String,)| {
            calls.record();
            async move { Ok::<_, Infallible>(format!("<p>{path}</p>")) }
        }
    });

    let first = cache.call(("intro.md".to_owned(),)).await.unwrap();
    let second = cache.call(("intro.md".to_owned(),)).await.unwrap();

    assert_eq!(first.as_str(), "<p>intro.md</p>");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.get(), 1);
}

#[tokio::test]
async fn test_different_arguments_compute_separately() {
    test::setup();

    let calls = CallCounter::new();
    let cache = ProcessCache::new("sum", {
        let calls = calls.clone();
        move |(a, b): (i64, i64)| {
            calls.record();
            async move { Ok::<_, Infallible>(a + b) }
        }
    });

    assert_eq!(*cache.call((1, 2)).await.unwrap(), 3);
    assert_eq!(*cache.call((1, 3)).await.unwrap(), 4);
    // argument order matters
    assert_eq!(*cache.call((2, 1)).await.unwrap(), 3);
    assert_eq!(calls.get(), 3);

    assert_eq!(*cache.call((1, 2)).await.unwrap(), 3);
    assert_eq!(calls.get(), 3);
    assert_eq!(cache.entry_count().await, 3);
}

#[tokio::test]
async fn test_failures_are_retried() {
    test::setup();

    let calls = CallCounter::new();
    let cache = ProcessCache::new("flaky", {
        let calls = calls.clone();
        move |(path,): (String,)| {
            let attempt = calls.record();
            async move {
                if attempt == 0 {
                    Err(Failed(path))
                } else {
                    Ok(path.len())
                }
            }
        }
    });

    let err = cache.call(("guide.md".to_owned(),)).await.unwrap_err();
    assert_eq!(*err, Failed("guide.md".to_owned()));
    assert!(!cache.contains(&CacheKey::from_args(&("guide.md",)).unwrap()));

    assert_eq!(*cache.call(("guide.md".to_owned(),)).await.unwrap(), 8);
    assert_eq!(*cache.call(("guide.md".to_owned(),)).await.unwrap(), 8);
    assert_eq!(calls.get(), 2);

    let stats = cache.stats().await;
    assert_eq!(stats.accesses, 3);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.computations, 2);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn test_async_value_is_awaited() {
    test::setup();

    let calls = CallCounter::new();
    let cache = ProcessCache::new("slow", {
        let calls = calls.clone();
        move |(n,): (u64,)| {
            calls.record();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, Infallible>(vec![n; 3])
            }
        }
    });

    assert_eq!(*cache.call((7,)).await.unwrap(), [7, 7, 7]);
    assert_eq!(*cache.call((7,)).await.unwrap(), [7, 7, 7]);
    assert_eq!(calls.get(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_are_coalesced() {
    test::setup();

    let calls = CallCounter::new();
    let cache = ProcessCache::new("coalesced", {
        let calls = calls.clone();
        move |(path,): (String,)| {
            calls.record();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, Infallible>(path.to_uppercase())
            }
        }
    });

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.call(("pricing.md".to_owned(),)).await })
        })
        .collect();

    let mut values = vec![];
    for handle in handles {
        values.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(calls.get(), 1);
    assert!(values.iter().all(|value| Arc::ptr_eq(value, &values[0])));

    let stats = cache.stats().await;
    assert_eq!(stats.accesses, 8);
    assert_eq!(stats.computations, 1);
    assert_eq!(stats.hits, 7);
}

#[tokio::test]
async fn test_map_order_does_not_matter() {
    test::setup();

    let calls = CallCounter::new();
    let cache = ProcessCache::new("query", {
        let calls = calls.clone();
        move |(params,): (HashMap<String, u32>,)| {
            calls.record();
            async move { Ok::<_, Infallible>(params.values().sum::<u32>()) }
        }
    });

    let forward: HashMap<_, _> = (0..32).map(|i| (format!("param{i}"), i)).collect();
    let backward: HashMap<_, _> = (0..32).rev().map(|i| (format!("param{i}"), i)).collect();

    let first = cache.call((forward,)).await.unwrap();
    let second = cache.call((backward,)).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.get(), 1);
}

#[tokio::test]
async fn test_struct_arguments() {
    test::setup();

    #[derive(Serialize)]
    struct Page {
        slug: &'static str,
        locale: &'static str,
    }

    let calls = CallCounter::new();
    let cache = ProcessCache::new("pages", {
        let calls = calls.clone();
        move |page: Page| {
            calls.record();
            async move { Ok::<_, Infallible>(format!("/{}/{}", page.locale, page.slug)) }
        }
    });

    let url = cache
        .call(Page {
            slug: "pricing",
            locale: "en",
        })
        .await
        .unwrap();
    assert_eq!(url.as_str(), "/en/pricing");

    let key = CacheKey::from_args(&Page {
        slug: "pricing",
        locale: "en",
    })
    .unwrap();
    assert!(cache.contains(&key));

    cache
        .call(Page {
            slug: "pricing",
            locale: "de",
        })
        .await
        .unwrap();
    assert_eq!(calls.get(), 2);
}

#[tokio::test]
async fn test_explicit_invalidation() {
    test::setup();

    let calls = CallCounter::new();
    let cache = ProcessCache::new("render", {
        let calls = calls.clone();
        move |(path,): (String,)| {
            calls.record();
            async move { Ok::<_, Infallible>(path) }
        }
    });

    cache.call(("a.md".to_owned(),)).await.unwrap();
    cache.call(("b.md".to_owned(),)).await.unwrap();

    assert!(cache.invalidate(&CacheKey::from_args(&("a.md",)).unwrap()).await);
    assert!(!cache.contains(&CacheKey::from_args(&("a.md",)).unwrap()));
    assert!(cache.contains(&CacheKey::from_args(&("b.md",)).unwrap()));

    // invalidation is lazy, nothing is recomputed until the next call
    assert_eq!(calls.get(), 2);
    cache.call(("a.md".to_owned(),)).await.unwrap();
    assert_eq!(calls.get(), 3);
}
