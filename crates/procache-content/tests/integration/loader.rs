use std::sync::Arc;
use std::time::Duration;

use procache::{ChangeKind, FsWatcher, WatchRegistry};
use procache_content::{ContentError, ContentLoader, LoaderOptions};
use procache_test as test;

use crate::{BrokenRegistry, development_options, setup_loader};

#[tokio::test]
async fn test_load_document() {
    let (loader, _content_dir) = setup_loader(LoaderOptions::default());

    let doc = loader.load("docs/intro.md").await.unwrap();
    assert_eq!(doc.word_count, 40);
    assert!(doc.body.starts_with("\n# Introduction\n"));

    insta::assert_json_snapshot!(doc, {".body" => "[body]"}, @r###"
    {
      "path": "docs/intro.md",
      "slug": "docs/intro",
      "title": "Introduction",
      "front_matter": {
        "order": 1,
        "tags": [
          "basics",
          "setup"
        ]
      },
      "headings": [
        {
          "level": 1,
          "text": "Introduction",
          "anchor": "introduction"
        },
        {
          "level": 2,
          "text": "Installing",
          "anchor": "installing"
        },
        {
          "level": 2,
          "text": "Configuring the server",
          "anchor": "configuring-the-server"
        },
        {
          "level": 3,
          "text": "Development mode",
          "anchor": "development-mode"
        }
      ],
      "body": "[body]",
      "word_count": 40
    }
    "###);
}

#[tokio::test]
async fn test_index_documents() {
    let (loader, _content_dir) = setup_loader(LoaderOptions::default());

    let home = loader.load("index.md").await.unwrap();
    assert_eq!(home.slug, "");
    assert_eq!(home.title.as_deref(), Some("Welcome"));
    assert_eq!(
        home.front_matter["description"],
        "Everything about the platform."
    );

    let docs = loader.load("docs/index.mdx").await.unwrap();
    assert_eq!(docs.slug, "docs");
    assert_eq!(docs.title.as_deref(), Some("Documentation"));

    let post = loader.load("blog/hello-world.md").await.unwrap();
    assert_eq!(post.title.as_deref(), Some("Hello, World!"));
    assert_eq!(post.headings[0].anchor, "hello-world");
    assert_eq!(post.front_matter["date"], "2024-03-01");
}

#[tokio::test]
async fn test_documents_are_cached() {
    let (loader, _content_dir) = setup_loader(LoaderOptions::default());

    let first = loader.load("docs/intro.md").await.unwrap();
    let second = loader.load("/docs/intro.md").await.unwrap();
    let third = loader.load(r".\docs\intro.md").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &third));

    let stats = loader.stats().await;
    assert_eq!(stats.accesses, 3);
    assert_eq!(stats.computations, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn test_load_errors() {
    let (loader, _content_dir) = setup_loader(LoaderOptions::default());

    let err = loader.load("missing.md").await.unwrap_err();
    assert!(matches!(*err, ContentError::NotFound(ref path) if path == "missing.md"));

    let err = loader.load("notes.txt").await.unwrap_err();
    assert!(matches!(*err, ContentError::UnsupportedType(_)));

    let err = loader.load("../secrets.md").await.unwrap_err();
    assert!(matches!(*err, ContentError::InvalidPath(_)));

    let err = loader.load("broken.md").await.unwrap_err();
    assert!(matches!(*err, ContentError::FrontMatter { .. }));

    let stats = loader.stats().await;
    assert_eq!(stats.failures, 2);
    assert_eq!(stats.entries, 0);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let (loader, content_dir) = setup_loader(LoaderOptions::default());

    let err = loader.load("docs/new.md").await.unwrap_err();
    assert!(matches!(*err, ContentError::NotFound(_)));

    test::write_file(content_dir.path(), "docs/new.md", "# Brand New\n");
    let doc = loader.load("docs/new.md").await.unwrap();
    assert_eq!(doc.title.as_deref(), Some("Brand New"));
}

#[tokio::test]
async fn test_changes_need_invalidation_outside_development() {
    let (loader, content_dir) = setup_loader(LoaderOptions::default());
    assert!(!loader.is_watching());

    let before = loader.load("docs/intro.md").await.unwrap();
    test::write_file(content_dir.path(), "docs/intro.md", "# Rewritten\n");

    let cached = loader.load("docs/intro.md").await.unwrap();
    assert!(Arc::ptr_eq(&before, &cached));

    assert!(loader.invalidate("docs/intro.md").await.unwrap());
    assert!(!loader.invalidate("docs/intro.md").await.unwrap());

    let after = loader.load("docs/intro.md").await.unwrap();
    assert_eq!(after.title.as_deref(), Some("Rewritten"));
}

#[tokio::test]
async fn test_invalidate_all() {
    let (loader, _content_dir) = setup_loader(LoaderOptions::default());

    loader.load("index.md").await.unwrap();
    loader.load("docs/intro.md").await.unwrap();
    loader.load("docs/index.mdx").await.unwrap();
    assert_eq!(loader.stats().await.entries, 3);

    loader.invalidate_all().await;

    let stats = loader.stats().await;
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.invalidations, 3);

    let err = loader.invalidate("../x.md").await.unwrap_err();
    assert!(matches!(err, ContentError::InvalidPath(_)));
}

#[tokio::test]
async fn test_development_invalidation() {
    let (options, watcher) = development_options();
    let (loader, content_dir) = setup_loader(options);
    assert!(loader.is_watching());
    assert_eq!(watcher.watched_dirs(), [content_dir.path().to_owned()]);

    let intro = loader.load("docs/intro.md").await.unwrap();
    let home = loader.load("index.md").await.unwrap();

    test::write_file(content_dir.path(), "docs/intro.md", "# Rewritten\n");
    watcher
        .emit(content_dir.path(), ChangeKind::Change, "docs/intro.md")
        .await;

    let reloaded = loader.load("docs/intro.md").await.unwrap();
    assert!(!Arc::ptr_eq(&intro, &reloaded));
    assert_eq!(reloaded.title.as_deref(), Some("Rewritten"));

    // other documents are untouched
    assert!(Arc::ptr_eq(&home, &loader.load("index.md").await.unwrap()));
}

#[tokio::test]
async fn test_development_ignores_other_files() {
    let (options, watcher) = development_options();
    let (loader, content_dir) = setup_loader(options);

    loader.load("docs/intro.md").await.unwrap();
    watcher
        .emit(content_dir.path(), ChangeKind::Change, "notes.txt")
        .await;
    watcher
        .emit(content_dir.path(), ChangeKind::Rename, "docs")
        .await;

    assert_eq!(loader.stats().await.invalidations, 0);
}

#[tokio::test]
async fn test_no_watch_outside_development() {
    let (mut options, watcher) = development_options();
    options.development = false;
    let (loader, _content_dir) = setup_loader(options);

    assert!(!loader.is_watching());
    assert_eq!(watcher.registrations(), 0);
}

#[tokio::test]
async fn test_watch_failure_degrades() {
    test::setup();

    let content_dir = test::tempdir();
    test::copy_fixture("content", content_dir.path());

    let options = LoaderOptions {
        development: true,
        registry: Arc::new(BrokenRegistry),
    };
    let loader = ContentLoader::new(content_dir.path(), options).unwrap();
    assert!(!loader.is_watching());

    let doc = loader.load("index.md").await.unwrap();
    assert_eq!(doc.title.as_deref(), Some("Welcome"));
}

#[tokio::test]
async fn test_missing_content_dir() {
    test::setup();

    let content_dir = test::tempdir();
    let err = ContentLoader::new(content_dir.path().join("missing"), LoaderOptions::default())
        .unwrap_err();
    assert!(matches!(err, ContentError::NotFound(_)));
}

#[tokio::test]
async fn test_loader_owns_registry() {
    let registry: Arc<dyn WatchRegistry + Send + Sync> = Arc::new(FsWatcher::new());
    let options = LoaderOptions {
        development: true,
        registry: Arc::clone(&registry),
    };
    let (loader, _content_dir) = setup_loader(options);
    assert!(loader.is_watching());
    assert!(Arc::ptr_eq(loader.registry(), &registry));

    drop(registry);
    assert_eq!(Arc::strong_count(loader.registry()), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_filesystem_changes() {
    let options = LoaderOptions {
        development: true,
        registry: Arc::new(FsWatcher::new()),
    };
    let (loader, content_dir) = setup_loader(options);
    assert!(loader.is_watching());

    let doc = loader.load("blog/hello-world.md").await.unwrap();
    assert_eq!(doc.title.as_deref(), Some("Hello, World!"));

    test::write_file(
        content_dir.path(),
        "blog/hello-world.md",
        "# Hello again\n\nEdited while the server runs.\n",
    );

    let mut title = None;
    for _ in 0..50 {
        let doc = loader.load("blog/hello-world.md").await.unwrap();
        if doc.title.as_deref() == Some("Hello again") {
            title = doc.title.clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(title.as_deref(), Some("Hello again"));
}
