//! Shared state of the HTTP endpoints.

use std::sync::Arc;

use anyhow::{Context, Result};
use procache::FsWatcher;
use procache_content::{ContentLoader, LoaderOptions};

use crate::config::Config;

/// The content loader and the settings the endpoints depend on.
///
/// This is cheap to clone, clones share the underlying cache.
#[derive(Clone, Debug)]
pub struct ContentService {
    loader: ContentLoader,
    development: bool,
}

impl ContentService {
    /// Creates the service for the configured content directory.
    ///
    /// In development, the content directory is watched with the platform's file watcher.
    pub fn create(config: Config) -> Result<Self> {
        let options = LoaderOptions {
            development: config.development,
            registry: Arc::new(FsWatcher::new()),
        };
        Self::with_options(config, options)
    }

    /// Creates the service with an explicit watch registry.
    pub fn with_options(config: Config, options: LoaderOptions) -> Result<Self> {
        let loader = ContentLoader::new(&config.content_dir, options).with_context(|| {
            format!(
                "failed to open content directory {}",
                config.content_dir.display()
            )
        })?;

        if config.development {
            tracing::info!(
                root = %config.content_dir.display(),
                watching = loader.is_watching(),
                "Development mode enabled",
            );
        }

        Ok(Self {
            loader,
            development: config.development,
        })
    }

    /// The document loader.
    pub fn loader(&self) -> &ContentLoader {
        &self.loader
    }

    /// Whether the server runs in development mode.
    pub fn development(&self) -> bool {
        self.development
    }
}
